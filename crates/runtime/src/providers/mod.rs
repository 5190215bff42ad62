//! Model backend adapters.
//!
//! Each provider implements [`Backend`](crate::Backend) for its API.

mod ollama;

pub use ollama::{DEFAULT_BASE_URL, OllamaBackend, OllamaBackendBuilder};
