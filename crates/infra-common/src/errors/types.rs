use thiserror::Error;

/// Result alias used by the infrastructure helpers
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared infrastructure
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),

    /// Any other error, annotated with where it happened
    #[error("{0}")]
    Custom(String),
}
