//! The bounded agent loop.

use crate::model::{Backend, Message, ModelRequest};
use crate::transcript::TranscriptSink;
use crate::{Error, Result};
use serde_json::Value;
use storage::SessionId;
use tools::{CallArgs, ToolDocument, ToolRegistry};
use tracing::{debug, warn};

/// Model turns allowed per exchange unless configured otherwise.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Prefix of a tool message reporting a failed call.
pub const TOOL_ERROR_PREFIX: &str = "ERROR: ";

/// Limits applied to each exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    max_turns: usize,
}

impl LoopConfig {
    /// `max_turns` must be at least one.
    pub fn new(max_turns: usize) -> Result<Self> {
        if max_turns == 0 {
            return Err(Error::Config("max_turns must be at least 1".into()));
        }
        Ok(Self { max_turns })
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The model answered without requesting tools.
    Final(String),
    /// Every allowed turn requested tools.
    BoundExceeded,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Final(_) => "final",
            Self::BoundExceeded => "bound_exceeded",
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Final(text) => Some(text),
            Self::BoundExceeded => None,
        }
    }
}

/// Result of one user exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub outcome: Outcome,
    /// Model turns taken.
    pub turns: usize,
}

/// A conversation with one model backend and one tool registry.
pub struct Session<B: Backend> {
    pub id: SessionId,
    backend: B,
    registry: ToolRegistry,
    documents: Vec<ToolDocument>,
    config: LoopConfig,
    messages: Vec<Message>,
    system: Option<String>,
    sink: Option<Box<dyn TranscriptSink>>,
}

impl<B: Backend> Session<B> {
    /// Create a new session. Tool documents are rendered once, here.
    pub fn new(backend: B, registry: ToolRegistry) -> Self {
        let documents = registry.documents();
        Self {
            id: SessionId::new(),
            backend,
            registry,
            documents,
            config: LoopConfig::default(),
            messages: Vec::new(),
            system: None,
            sink: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a transcript sink and announce the session to it.
    pub fn with_sink(mut self, sink: impl TranscriptSink + 'static) -> Self {
        let mut sink: Box<dyn TranscriptSink> = Box::new(sink);
        if let Err(e) = sink.session_start(self.id) {
            warn!(session = %self.id, error = %e, "transcript sink failed");
        }
        self.sink = Some(sink);
        self
    }

    /// The conversation so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> LoopConfig {
        self.config
    }

    /// Run one exchange: append the user's message and drive the model and
    /// tools until a final answer or the turn bound.
    ///
    /// Tool failures become `tool` messages. Only backend failures are
    /// returned as errors.
    pub async fn chat(&mut self, user_input: &str) -> Result<Exchange> {
        self.push(Message::user(user_input));

        let mut turns = 0;
        let outcome = loop {
            if turns == self.config.max_turns {
                warn!(session = %self.id, turns, "turn bound reached without a final answer");
                break Outcome::BoundExceeded;
            }
            turns += 1;

            debug!(session = %self.id, turn = turns, messages = self.messages.len(), "model turn");
            let response = self
                .backend
                .call(ModelRequest {
                    messages: &self.messages,
                    tools: &self.documents,
                    system: self.system.as_deref(),
                })
                .await?;

            let message = response.message;
            let calls = message.calls().to_vec();
            let answer = message.text().to_string();
            self.push(message);

            if calls.is_empty() {
                break Outcome::Final(answer);
            }

            for call in calls {
                let content = self.run_tool(&call.name, CallArgs::from(call.arguments));
                self.push(Message::tool(content));
            }
        };

        self.notify(|sink, id| sink.exchange_end(id, &outcome, turns));

        Ok(Exchange { outcome, turns })
    }

    /// End the session.
    pub fn end(mut self) {
        self.notify(|sink, id| sink.session_end(id));
    }

    fn run_tool(&self, name: &str, args: CallArgs) -> String {
        debug!(session = %self.id, tool = %name, "tool call");
        match self.registry.invoke(name, args) {
            Ok(value) => render_result(value),
            Err(e) => {
                warn!(session = %self.id, tool = %name, error = %e, "tool call failed");
                format!("{TOOL_ERROR_PREFIX}{e}")
            }
        }
    }

    fn push(&mut self, message: Message) {
        self.notify(|sink, id| sink.message(id, &message));
        self.messages.push(message);
    }

    fn notify<F>(&mut self, f: F)
    where
        F: FnOnce(&mut dyn TranscriptSink, SessionId) -> storage::Result<()>,
    {
        if let Some(sink) = self.sink.as_deref_mut() {
            if let Err(e) = f(sink, self.id) {
                warn!(session = %self.id, error = %e, "transcript sink failed");
            }
        }
    }
}

/// Strings are passed through as-is, everything else as compact JSON.
fn render_result(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
