use thiserror::Error;

/// Failures surfaced by the services. Each variant maps onto one HTTP status
/// in `api`; validation always happens before any write.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("concurrent update on {target} {id} could not be resolved")]
    Conflict { target: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        DomainError::Forbidden(msg.into())
    }
}

/// Raised by a versioned save when another writer committed first. Travels
/// inside `anyhow::Error` and is recovered with `downcast_ref`.
#[derive(Debug, Error)]
#[error("{table} row {id} changed since version {expected}")]
pub struct VersionConflict {
    pub table: &'static str,
    pub id: String,
    pub expected: i64,
}

pub fn is_version_conflict(err: &anyhow::Error) -> bool {
    err.downcast_ref::<VersionConflict>().is_some()
}
