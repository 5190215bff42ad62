//! Tool documents advertised to the model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Schema;

/// Bookkeeping key that schema generators inject and the model does not need.
pub const METADATA_KEY: &str = "title";

/// A callable tool as the model backend expects to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDocument {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDocument,
}

/// Name, description and parameter schema of a function tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDocument {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDocument {
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Render a tool document.
///
/// The `required` array is present only when the schema has properties.
/// Metadata keys are stripped from the parameters with [`strip_key`].
pub fn build_doc(name: &str, description: &str, schema: &Schema) -> ToolDocument {
    let mut parameters = parameters_document(schema);
    strip_key(&mut parameters, METADATA_KEY);

    ToolDocument {
        kind: "function".into(),
        function: FunctionDocument {
            name: name.into(),
            description: description.into(),
            parameters,
        },
    }
}

/// JSON Schema object for a schema's parameters, before any stripping.
pub fn parameters_document(schema: &Schema) -> Value {
    let properties: Map<String, Value> = schema
        .iter()
        .map(|(name, spec)| (name.to_string(), spec.to_json()))
        .collect();

    let mut parameters = Map::new();
    parameters.insert("type".into(), Value::String("object".into()));
    parameters.insert("properties".into(), Value::Object(properties));
    if !schema.is_empty() {
        let required = schema
            .required_names()
            .into_iter()
            .map(|name| Value::String(name.into()))
            .collect();
        parameters.insert("required".into(), Value::Array(required));
    }
    Value::Object(parameters)
}

/// Remove `key` from every mapping where it sits next to a `type` keyword.
///
/// A `type` entry whose value is itself a mapping is a property that happens
/// to be called "type", not a keyword, and does not count. Levels without a
/// `type` keyword are left alone, so a parameter named like `key` inside
/// `properties` survives. `type` itself is never removed. Applying this twice
/// gives the same result as applying it once.
pub fn strip_key(value: &mut Value, key: &str) {
    match value {
        Value::Object(map) => {
            let typed = map.get("type").is_some_and(|kind| !kind.is_object());
            if typed && key != "type" {
                map.shift_remove(key);
            }
            for child in map.values_mut() {
                strip_key(child, key);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_key(item, key);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParamKind, ParameterSpec, Schema};
    use serde_json::json;

    fn calculate_schema() -> Schema {
        Schema::builder()
            .param(
                "expression",
                ParameterSpec::required(ParamKind::String).describe("arithmetic expression"),
            )
            .param("precision", ParameterSpec::optional(ParamKind::Integer, 2))
            .build()
            .unwrap()
    }

    #[test]
    fn document_has_function_shape() {
        let doc = build_doc("calculate", "Calculate the given expression.", &calculate_schema());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "function",
                "function": {
                    "name": "calculate",
                    "description": "Calculate the given expression.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "expression": {"type": "string", "description": "arithmetic expression"},
                            "precision": {"type": "integer", "default": 2}
                        },
                        "required": ["expression"]
                    }
                }
            })
        );
    }

    #[test]
    fn argumentless_tool_has_no_required() {
        let doc = build_doc("get_datetime", "Get current date and time.", &Schema::default());
        let parameters = &doc.function.parameters;
        assert_eq!(parameters["properties"], json!({}));
        assert!(parameters.get("required").is_none());
    }

    #[test]
    fn required_present_but_empty_when_all_defaulted() {
        let schema = Schema::builder()
            .param("verbose", ParameterSpec::optional(ParamKind::Boolean, false))
            .build()
            .unwrap();
        let doc = build_doc("t", "", &schema);
        assert_eq!(doc.function.parameters["required"], json!([]));
    }

    #[test]
    fn strip_removes_titles_next_to_type_at_any_depth() {
        let mut value = json!({
            "title": "Args",
            "type": "object",
            "properties": {
                "title": {"title": "Title", "type": "string"},
                "tags": {
                    "title": "Tags",
                    "type": "array",
                    "items": {"title": "Tag", "type": "string"}
                }
            },
            "$defs": {"title": "not a schema level"}
        });
        strip_key(&mut value, "title");
        assert_eq!(
            value,
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                },
                "$defs": {"title": "not a schema level"}
            })
        );
    }

    #[test]
    fn strip_is_idempotent() {
        let mut once = json!({
            "type": "object",
            "title": "X",
            "anyOf": [{"type": "string", "title": "S"}, {"title": "untyped"}]
        });
        strip_key(&mut once, "title");
        let mut twice = once.clone();
        strip_key(&mut twice, "title");
        assert_eq!(once, twice);
        assert_eq!(once["anyOf"][1], json!({"title": "untyped"}));
    }

    #[test]
    fn strip_never_removes_type() {
        let mut value = json!({"type": "string", "title": "T"});
        strip_key(&mut value, "type");
        assert_eq!(value, json!({"type": "string", "title": "T"}));
    }

    #[test]
    fn property_named_type_is_not_a_keyword() {
        let mut value = json!({
            "properties": {
                "type": {"type": "string"},
                "title": {"type": "string"}
            }
        });
        strip_key(&mut value, "title");
        assert!(value["properties"].get("title").is_some());
    }

    #[test]
    fn explicit_schema_titles_are_stripped_from_document() {
        let schema = Schema::from_json_schema(&json!({
            "title": "SearchArgs",
            "type": "object",
            "properties": {"query": {"title": "Query", "type": "string"}},
            "required": ["query"]
        }))
        .unwrap();
        let doc = build_doc("search", "Search.", &schema);
        assert_eq!(
            doc.function.parameters["properties"]["query"],
            json!({"type": "string"})
        );
    }
}
