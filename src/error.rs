use indicatif::style::TemplateError;
use thiserror::Error;

pub type TraderResult<T> = Result<T, TraderError>;

#[derive(Debug, Error)]
pub enum TraderError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Errors occurring within Agent logic or execution.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unknown agent kind: '{0}'")]
    UnknownKind(String),

    #[error("Invalid input to agent: {0}")]
    InvalidInput(String),

    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    #[error("Experience replay failed: {0}")]
    Replay(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors related to price data loading and validation.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Price series for '{instrument}' is too short: {len} point(s), need at least 2")]
    SeriesTooShort { instrument: String, len: usize },

    #[error("Invalid price at index {index}: {value}")]
    InvalidPrice { index: usize, value: f64 },

    #[error("Missing price at index {0}")]
    MissingPrice(usize),

    #[error("Missing column '{0}' in price data")]
    MissingColumn(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors related to the training environment configuration and execution loop.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("Progress bar error")]
    ProgressBar(#[from] TemplateError),
}

/// Errors related to File I/O and serialization.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode or decode checkpoint")]
    Postcard(#[from] postcard::Error),

    #[error("File system error: {0}")]
    FileSystem(String),
}

/// Errors related to internal system invariants.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
