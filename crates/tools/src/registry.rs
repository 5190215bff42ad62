//! Name-keyed tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{CallArgs, FunctionToolBuilder, RegistryError, Tool, ToolDocument, ToolError};

/// The set of tools available to one conversation.
///
/// Tools keep their registration order, which is also the order in which
/// they are advertised to the model.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<Arc<dyn Tool>, RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool. Names must be unique.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<Arc<dyn Tool>, RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(tool = %name, params = tool.schema().len(), "registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::clone(&tool));
        Ok(tool)
    }

    /// Build and register a function tool.
    ///
    /// A schema derivation failure rejects only this tool.
    pub fn register_function(
        &mut self,
        builder: FunctionToolBuilder,
    ) -> Result<Arc<dyn Tool>, RegistryError> {
        let tool = builder.build()?;
        self.register(tool)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    /// Documents for every tool, in registration order.
    pub fn documents(&self) -> Vec<ToolDocument> {
        self.tools.iter().map(|tool| tool.describe()).collect()
    }

    /// Resolve `name` and invoke it.
    pub fn invoke(&self, name: &str, args: CallArgs) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.invoke(args)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionTool, Param, Signature};
    use serde_json::json;

    fn echo() -> FunctionToolBuilder {
        FunctionTool::builder(
            Signature::new("echo")
                .doc("Echo the text back.")
                .param(Param::new::<String>("text")),
            |args| args.get::<String>("text").map_err(Into::into),
        )
    }

    #[test]
    fn empty_registry_has_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.documents().is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register_function(echo()).unwrap();
        let Err(err) = registry.register_function(echo()) else {
            panic!("duplicate registration was accepted");
        };
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn derivation_failure_rejects_only_that_tool() {
        let mut registry = ToolRegistry::new();
        let broken = FunctionTool::builder(
            Signature::new("broken").param(Param::untyped("x")),
            |_| Ok(Value::Null),
        );
        assert!(matches!(
            registry.register_function(broken),
            Err(RegistryError::Schema(_))
        ));
        registry.register_function(echo()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["echo"]);
    }

    #[test]
    fn invoke_resolves_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register_function(echo()).unwrap();
        let out = registry
            .invoke("echo", CallArgs::new().named("text", "hi"))
            .unwrap();
        assert_eq!(out, json!("hi"));
        assert_eq!(
            registry.invoke("nope", CallArgs::new()).unwrap_err(),
            ToolError::NotFound("nope".into())
        );
    }

    #[test]
    fn documents_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register_function(echo().name("b")).unwrap();
        registry.register_function(echo().name("a")).unwrap();
        let names: Vec<_> = registry.documents().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
