//! Tackle runtime: the agent loop and model backends.
//!
//! # Overview
//!
//! - **Session**: owns the message sequence of one conversation and runs the
//!   bounded agent loop: ask the model, run the tool calls it issues, feed the
//!   results back, until it answers or the turn bound is reached.
//! - **Backend**: a trait abstracting model providers. [`OllamaBackend`]
//!   talks to Ollama's `/api/chat`.
//! - **TranscriptSink**: observes every appended message;
//!   [`storage::EventStore`] implements it.
//!
//! # Example
//!
//! ```no_run
//! use runtime::{OllamaBackend, Outcome, Session};
//! use storage::EventStore;
//! use tools::ToolRegistry;
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OllamaBackend::builder("mistral-nemo").build();
//! let store = EventStore::in_memory()?;
//!
//! let mut session = Session::new(backend, ToolRegistry::new()).with_sink(store);
//! let exchange = session.chat("What is 2+2?").await?;
//! if let Outcome::Final(answer) = exchange.outcome {
//!     println!("{answer}");
//! }
//! session.end();
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
mod providers;
mod session;
mod transcript;

pub use error::{Error, Result};
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCallRequest, Usage,
};
pub use providers::{DEFAULT_BASE_URL, OllamaBackend, OllamaBackendBuilder};
pub use session::{DEFAULT_MAX_TURNS, Exchange, LoopConfig, Outcome, Session, TOOL_ERROR_PREFIX};
pub use transcript::TranscriptSink;
