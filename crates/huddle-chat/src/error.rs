use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// Failures surfaced by the messaging core.
///
/// Validation and authorization problems are detected before any write.
/// Duplicate inserts (receipts, memberships, reactions) never show up here:
/// they are absorbed as idempotent successes.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Store failure: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}
