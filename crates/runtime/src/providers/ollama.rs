//! Ollama chat API backend.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCallRequest, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tools::ToolDocument;
use tracing::debug;

/// Where a local Ollama server listens by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDocument],
}

fn no_tools(tools: &&[ToolDocument]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: Option<ApiResponseMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    function: ApiResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ApiResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    model: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl OllamaBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Per-request timeout. No timeout is applied when unset.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> OllamaBackend {
        OllamaBackend {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/chat", self.base_url.trim_end_matches('/')),
            model: self.model,
            timeout: self.timeout,
        }
    }
}

/// Ollama `/api/chat` backend.
pub struct OllamaBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Option<Duration>,
}

impl OllamaBackend {
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn message_to_api(msg: &Message) -> ApiMessage {
        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| ApiToolCall {
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: Value::Object(call.arguments.clone()),
                    },
                })
                .collect()
        });

        ApiMessage {
            role: Self::role_to_api(msg.role),
            content: msg.text().to_string(),
            tool_calls,
        }
    }

    fn build_messages(request: &ModelRequest<'_>) -> Vec<ApiMessage> {
        let system = request.system.map(|system| ApiMessage {
            role: "system",
            content: system.to_string(),
            tool_calls: None,
        });
        system
            .into_iter()
            .chain(request.messages.iter().map(Self::message_to_api))
            .collect()
    }

    fn response_to_message(message: ApiResponseMessage) -> Result<Message, ModelError> {
        let tool_calls = match message.tool_calls {
            Some(calls) if !calls.is_empty() => Some(
                calls
                    .into_iter()
                    .map(|call| {
                        let arguments = parse_arguments(&call.function.name, call.function.arguments)?;
                        Ok(ToolCallRequest::new(call.function.name, arguments))
                    })
                    .collect::<Result<Vec<_>, ModelError>>()?,
            ),
            _ => None,
        };

        Ok(Message {
            role: Role::Assistant,
            content: message.content,
            tool_calls,
        })
    }
}

/// Accept arguments as an object, a JSON-encoded object, or null.
fn parse_arguments(tool: &str, arguments: Value) -> Result<Map<String, Value>, ModelError> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(raw) if raw.trim().is_empty() => Ok(Map::new()),
        Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ModelError::InvalidResponse(format!(
                "arguments for {tool} are not an object: {other}"
            ))),
            Err(e) => Err(ModelError::InvalidResponse(format!(
                "arguments for {tool} are not valid JSON: {e}"
            ))),
        },
        other => Err(ModelError::InvalidResponse(format!(
            "arguments for {tool} are not an object: {other}"
        ))),
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.model)
    }
}

impl Backend for OllamaBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = ApiRequest {
            model: &self.model,
            messages: Self::build_messages(&request),
            stream: false,
            tools: request.tools,
        };

        debug!(
            endpoint = %self.endpoint,
            messages = api_request.messages.len(),
            tools = request.tools.len(),
            "sending chat request"
        );

        let mut req = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&api_request);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(ModelError::Api(format!("{status}: {detail}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let message = api_response
            .message
            .ok_or_else(|| ModelError::InvalidResponse("response has no message".into()))?;

        Ok(ModelResponse {
            message: Self::response_to_message(message)?,
            usage: Usage {
                input_tokens: api_response.prompt_eval_count.unwrap_or_default(),
                output_tokens: api_response.eval_count.unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_joins_base_url() {
        let backend = OllamaBackend::builder("mistral-nemo")
            .base_url("http://gpu-box:11434/")
            .build();
        assert_eq!(backend.endpoint, "http://gpu-box:11434/api/chat");
        assert_eq!(backend.to_string(), "ollama(mistral-nemo)");
    }

    #[test]
    fn system_prompt_is_prepended() {
        let messages = [Message::user("hi")];
        let request = ModelRequest {
            messages: &messages,
            tools: &[],
            system: Some("be brief"),
        };
        let api = OllamaBackend::build_messages(&request);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].content, "hi");
    }

    #[test]
    fn request_serializes_tool_calls_as_functions() {
        let mut args = Map::new();
        args.insert("expression".into(), json!("2+2"));
        let messages = [
            Message::user("What is 2+2?"),
            Message::tool_calls(vec![ToolCallRequest::new("calculate", args)]),
            Message::tool("4"),
        ];
        let request = ApiRequest {
            model: "mistral-nemo",
            messages: OllamaBackend::build_messages(&ModelRequest {
                messages: &messages,
                tools: &[],
                system: None,
            }),
            stream: false,
            tools: &[],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("tools").is_none());
        assert_eq!(
            json["messages"][1]["tool_calls"][0],
            json!({"function": {"name": "calculate", "arguments": {"expression": "2+2"}}})
        );
        assert_eq!(json["messages"][1]["content"], "");
        assert_eq!(json["messages"][2], json!({"role": "tool", "content": "4"}));
    }

    #[test]
    fn response_arguments_accept_object_string_and_null() {
        let body = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "a", "arguments": {"x": 1}}},
                    {"function": {"name": "b", "arguments": "{\"y\": 2}"}},
                    {"function": {"name": "c", "arguments": null}},
                    {"function": {"name": "d"}}
                ]
            },
            "prompt_eval_count": 12,
            "eval_count": 3
        });
        let response: ApiResponse = serde_json::from_value(body).unwrap();
        let message = OllamaBackend::response_to_message(response.message.unwrap()).unwrap();
        let calls = message.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].arguments["x"], 1);
        assert_eq!(calls[1].arguments["y"], 2);
        assert!(calls[2].arguments.is_empty());
        assert!(calls[3].arguments.is_empty());
    }

    #[test]
    fn empty_tool_call_list_is_final() {
        let body = json!({"message": {"content": "The answer is 4.", "tool_calls": []}});
        let response: ApiResponse = serde_json::from_value(body).unwrap();
        let message = OllamaBackend::response_to_message(response.message.unwrap()).unwrap();
        assert!(!message.has_tool_calls());
        assert_eq!(message.text(), "The answer is 4.");
    }

    #[test]
    fn non_object_arguments_are_invalid() {
        assert!(matches!(
            parse_arguments("a", json!([1, 2])),
            Err(ModelError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_arguments("a", json!("not json")),
            Err(ModelError::InvalidResponse(_))
        ));
    }
}
