//! Binding call arguments to a signature and validating them against a schema.
//!
//! Binding is purely structural: it matches supplied values to the declared
//! parameter list. Validation is a second, independent pass that checks each
//! bound value against the schema and fills defaults.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{ArgumentError, Schema, Signature, ToolError};

/// Arguments of a single call, positional and/or named.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }
}

impl From<Map<String, Value>> for CallArgs {
    fn from(named: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            named,
        }
    }
}

impl From<Vec<Value>> for CallArgs {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Map::new(),
        }
    }
}

/// Validated, default-filled arguments handed to a tool body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Decode an argument into a Rust type.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|source| ArgumentError::Decode {
            name: name.to_string(),
            source,
        })
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Match supplied arguments to the declared parameter list.
///
/// Follows ordinary call rules: positional values fill parameters in order,
/// then named values fill the rest. Too many positional values, unknown
/// names, a name that was already filled positionally, and missing
/// parameters that have no default are all binding failures. Defaults are
/// not applied here.
pub fn bind(tool: &str, signature: &Signature, args: CallArgs) -> Result<Map<String, Value>, ToolError> {
    let ident = signature.ident();
    let params = signature.params();

    if args.positional.len() > params.len() {
        return Err(ToolError::binding(
            tool,
            format!(
                "{ident}() takes {} but {} given",
                plural(params.len(), "positional argument"),
                match args.positional.len() {
                    1 => "1 was".to_string(),
                    n => format!("{n} were"),
                }
            ),
        ));
    }

    let mut bound = Map::new();
    for (param, value) in params.iter().zip(args.positional) {
        bound.insert(param.name().to_string(), value);
    }

    for (name, value) in args.named {
        if !params.iter().any(|param| param.name() == name) {
            return Err(ToolError::binding(
                tool,
                format!("{ident}() got an unexpected keyword argument '{name}'"),
            ));
        }
        if bound.contains_key(&name) {
            return Err(ToolError::binding(
                tool,
                format!("{ident}() got multiple values for argument '{name}'"),
            ));
        }
        bound.insert(name, value);
    }

    let missing: Vec<&str> = params
        .iter()
        .filter(|param| !param.has_default() && !bound.contains_key(param.name()))
        .map(|param| param.name())
        .collect();
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|name| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ToolError::binding(
            tool,
            format!(
                "{ident}() missing {}: {names}",
                plural(missing.len(), "required argument")
            ),
        ));
    }

    Ok(bound)
}

/// Check bound arguments against a schema and fill in defaults.
///
/// Every problem found is reported in one message. Bound values the schema
/// does not describe are passed through unchecked.
pub fn validate(tool: &str, schema: &Schema, mut bound: Map<String, Value>) -> Result<Arguments, ToolError> {
    let mut errors = Vec::new();
    let mut arguments = Map::new();

    for (name, spec) in schema.iter() {
        match bound.shift_remove(name) {
            Some(value) => {
                let null_default = value.is_null() && spec.default_value() == Some(&Value::Null);
                if null_default {
                    arguments.insert(name.to_string(), value);
                    continue;
                }
                match spec.kind().coerce(value) {
                    Ok(value) => {
                        arguments.insert(name.to_string(), value);
                    }
                    Err(message) => errors.push(format!("{name}: {message}")),
                }
            }
            None => match spec.default_value() {
                Some(default) => {
                    arguments.insert(name.to_string(), default.clone());
                }
                None => errors.push(format!("{name}: field required")),
            },
        }
    }

    if !errors.is_empty() {
        return Err(ToolError::validation(tool, errors.join("; ")));
    }

    arguments.extend(bound);
    Ok(Arguments(arguments))
}
