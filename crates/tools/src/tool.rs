//! The tool capability trait.

use serde_json::Value;

use crate::{CallArgs, Schema, ToolDocument, ToolError, build_doc};

/// A named, described, callable capability exposed to the model.
///
/// Implementations must be safe to call repeatedly; a failed call must leave
/// the tool usable for the next one.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// The argument schema advertised to the model and used for validation.
    fn schema(&self) -> &Schema;

    /// Wire document advertising this tool.
    fn describe(&self) -> ToolDocument {
        build_doc(self.name(), self.description(), self.schema())
    }

    /// Bind, validate and execute one call.
    fn invoke(&self, args: CallArgs) -> Result<Value, ToolError>;
}
