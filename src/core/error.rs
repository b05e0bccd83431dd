use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Correlation id '{0}' is already registered")]
    DuplicateCorrelation(String),

    #[error("No in-flight session for correlation id '{0}'")]
    UnknownCorrelation(String),

    #[error("Session is no longer accepting arrivals: {0}")]
    SessionClosed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;


impl<T> From<std::sync::PoisonError<T>> for GatewayError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
