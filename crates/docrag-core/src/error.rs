use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Snapshot could not be decoded: {0}")]
    Deserialization(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable, machine-readable code for each error kind.
    ///
    /// Outer layers (HTTP handlers, CLI exit codes) map on this rather than
    /// on the display string.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidInput(_) => "invalid_input",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Embedding(_) => "embedding_failure",
            Error::Generation(_) => "generation_failure",
            Error::Deserialization(_) => "deserialization_error",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
