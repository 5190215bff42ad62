use thiserror::Error;

use crate::model::ModelError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Registry(#[from] tools::RegistryError),
}

pub type Result<T> = std::result::Result<T, Error>;
