//! Tools backed by plain Rust functions.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::binding::{bind, validate};
use crate::{Arguments, CallArgs, Schema, SchemaDerivationError, Signature, Tool, ToolError};

/// Error type tool bodies may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Callable = Arc<dyn Fn(&Arguments) -> Result<Value, BoxError> + Send + Sync>;

/// A tool wrapping a function together with its declared signature.
///
/// # Example
///
/// ```
/// use tools::{CallArgs, FunctionTool, Param, Signature, Tool};
///
/// let add = FunctionTool::builder(
///     Signature::new("add_numbers")
///         .param(Param::new::<i64>("a"))
///         .param(Param::new::<i64>("b")),
///     |args| Ok(args.get::<i64>("a")? + args.get::<i64>("b")?),
/// )
/// .description("Calculate a + b")
/// .build()?;
///
/// let sum = add.invoke(CallArgs::new().arg(10).arg(20)).unwrap();
/// assert_eq!(sum, 30);
/// # Ok::<(), tools::SchemaDerivationError>(())
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    signature: Signature,
    schema: Schema,
    function: Callable,
}

impl FunctionTool {
    /// Start registering `function` under the given signature.
    pub fn builder<F, R>(signature: Signature, function: F) -> FunctionToolBuilder
    where
        F: Fn(&Arguments) -> Result<R, BoxError> + Send + Sync + 'static,
        R: Serialize,
    {
        let function: Callable = Arc::new(move |args: &Arguments| -> Result<Value, BoxError> {
            let output = function(args)?;
            Ok(serde_json::to_value(output)?)
        });
        FunctionToolBuilder {
            signature,
            function,
            name: None,
            description: None,
            schema: None,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn invoke(&self, args: CallArgs) -> Result<Value, ToolError> {
        let bound = bind(&self.name, &self.signature, args)?;
        let arguments = validate(&self.name, &self.schema, bound)?;
        debug!(tool = %self.name, args = arguments.len(), "invoking tool");
        match panic::catch_unwind(AssertUnwindSafe(|| (self.function)(&arguments))) {
            Ok(result) => result.map_err(|e| ToolError::execution(&self.name, e.to_string())),
            Err(payload) => Err(ToolError::execution(&self.name, panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("tool panicked: {message}")
    } else {
        "tool panicked".to_string()
    }
}

/// Builder returned by [`FunctionTool::builder`].
///
/// Explicit name, description and schema win over what the signature
/// provides.
pub struct FunctionToolBuilder {
    signature: Signature,
    function: Callable,
    name: Option<String>,
    description: Option<String>,
    schema: Option<Schema>,
}

impl FunctionToolBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Use this schema instead of deriving one from the signature.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Finish the tool, deriving its schema when none was supplied.
    pub fn build(self) -> Result<FunctionTool, SchemaDerivationError> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => self.signature.derive_schema()?,
        };
        let name = self
            .name
            .unwrap_or_else(|| self.signature.ident().to_string());
        let description = self
            .description
            .or_else(|| self.signature.doc_text().map(str::to_string))
            .unwrap_or_default();

        Ok(FunctionTool {
            name,
            description,
            signature: self.signature,
            schema,
            function: self.function,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Param, ParamKind, ParameterSpec};
    use serde_json::json;

    fn add_numbers(a: i64, b: i64) -> i64 {
        a + b
    }

    fn add_tool() -> FunctionToolBuilder {
        FunctionTool::builder(
            Signature::new("_add_numbers")
                .param(Param::new::<i64>("a"))
                .param(Param::new::<i64>("b")),
            |args| Ok(add_numbers(args.get("a")?, args.get("b")?)),
        )
    }

    #[test]
    fn explicit_name_and_description_win() {
        let tool = add_tool()
            .name("add_numbers")
            .description("Calculate a + b")
            .build()
            .unwrap();
        assert_eq!(tool.name(), "add_numbers");
        assert_eq!(tool.description(), "Calculate a + b");
        assert_eq!(tool.invoke(CallArgs::new().arg(10).arg(20)).unwrap(), json!(30));
    }

    #[test]
    fn name_and_description_default_from_signature() {
        let tool = FunctionTool::builder(
            Signature::new("get_datetime").doc("Get current date and time."),
            |_| Ok("2024/01/01 00:00:00"),
        )
        .build()
        .unwrap();
        assert_eq!(tool.name(), "get_datetime");
        assert_eq!(tool.description(), "Get current date and time.");

        let bare = add_tool().build().unwrap();
        assert_eq!(bare.description(), "");
    }

    #[test]
    fn invoke_matches_bare_function() {
        let tool = add_tool().build().unwrap();
        let named = CallArgs::new().named("a", 7).named("b", -3);
        assert_eq!(tool.invoke(named).unwrap(), json!(add_numbers(7, -3)));
    }

    #[test]
    fn missing_required_argument_is_not_defaulted() {
        let tool = add_tool().build().unwrap();
        let err = tool.invoke(CallArgs::new().named("a", 1)).unwrap_err();
        assert!(matches!(err, ToolError::Binding { .. }));
    }

    #[test]
    fn integral_float_reaches_integer_body() {
        let double = FunctionTool::builder(
            Signature::new("double").param(Param::new::<i64>("n")),
            |args| Ok(args.get::<i64>("n")? * 2),
        )
        .build()
        .unwrap();
        assert_eq!(double.invoke(CallArgs::new().named("n", 3.0)).unwrap(), json!(6));
        assert!(matches!(
            double.invoke(CallArgs::new().named("n", 1e300)),
            Err(ToolError::Validation { .. })
        ));
    }

    #[test]
    fn wrong_type_is_validation_error() {
        let tool = add_tool().build().unwrap();
        let err = tool
            .invoke(CallArgs::new().named("a", "1").named("b", 2))
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[test]
    fn body_failure_is_execution_error() {
        let tool = FunctionTool::builder(
            Signature::new("fail").param(Param::new::<String>("why")),
            |args| -> Result<Value, BoxError> { Err(args.get::<String>("why")?.into()) },
        )
        .build()
        .unwrap();
        let err = tool.invoke(CallArgs::new().arg("boom")).unwrap_err();
        assert_eq!(err, ToolError::execution("fail", "boom"));
    }

    #[test]
    fn panicking_body_is_execution_error() {
        let tool = FunctionTool::builder(Signature::new("explode"), |_| -> Result<Value, BoxError> {
            panic!("kaboom")
        })
        .build()
        .unwrap();
        let err = tool.invoke(CallArgs::new()).unwrap_err();
        assert_eq!(err, ToolError::execution("explode", "tool panicked: kaboom"));
    }

    #[test]
    fn untyped_signature_fails_build() {
        let result = FunctionTool::builder(
            Signature::new("loose").param(Param::untyped("x")),
            |_| Ok(Value::Null),
        )
        .build();
        assert!(matches!(
            result,
            Err(SchemaDerivationError::UntypedParameter { .. })
        ));
    }

    #[test]
    fn explicit_schema_skips_derivation() {
        let schema = Schema::builder()
            .param("x", ParameterSpec::required(ParamKind::Integer))
            .build()
            .unwrap();
        let tool = FunctionTool::builder(
            Signature::new("loose").param(Param::untyped("x")),
            |args| Ok(args.get::<i64>("x")? * 2),
        )
        .schema(schema)
        .build()
        .unwrap();
        assert_eq!(tool.invoke(CallArgs::new().arg(21)).unwrap(), json!(42));
        assert!(tool.invoke(CallArgs::new().arg("21")).is_err());
    }

    #[test]
    fn describe_renders_document() {
        let doc = add_tool().name("add_numbers").build().unwrap().describe();
        assert_eq!(doc.name(), "add_numbers");
        assert_eq!(doc.function.parameters["required"], json!(["a", "b"]));
    }
}
