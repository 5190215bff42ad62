use thiserror::Error;

/// Errors from model backend calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the call.
    #[error("network: {0}")]
    Network(String),

    /// The backend returned an error response.
    #[error("backend api: {0}")]
    Api(String),

    /// The backend response could not be parsed.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}
