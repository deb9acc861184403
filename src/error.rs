use thiserror::Error;

/// Core error taxonomy. Validation and Conflict are deterministic and never
/// retried; Storage is transient and may be retried by the caller with
/// backoff (the core itself performs no retries).
#[derive(Debug, Error)]
pub enum Error {
    /// Bad enum value, referential mismatch, out-of-range quarter, etc.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown id, or no rows matching a query filter.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation on create.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient storage failure (timeout, I/O). Caller may retry.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = msg.clone().unwrap_or_else(|| e.to_string());
                // Only uniqueness violations are conflicts; foreign-key and
                // NOT NULL failures are referential mistakes in the input.
                match e.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Error::Conflict(detail),
                    _ => Error::Validation(detail),
                }
            }
            _ => Error::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(format!("json column: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal inconsistency found while folding actions. Collected and
/// returned alongside partial aggregation results, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub action_id: i64,
    pub message: String,
}

impl std::fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "action {}: {}", self.action_id, self.message)
    }
}
