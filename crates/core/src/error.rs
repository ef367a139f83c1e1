use thiserror::Error;

pub type AdboardResult<T> = Result<T, AdboardError>;

#[derive(Error, Debug)]
pub enum AdboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
