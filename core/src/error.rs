use thiserror::Error;

/// Fatal engine errors.
///
/// Data inconsistencies are never raised through this type: they are
/// collected as [`crate::violation::Violation`]s so a pass can run to
/// completion. Only structurally unreadable input ends a run.
#[derive(Error, Debug)]
pub enum BelError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Collection '{name}' is missing from the input document")]
    MissingCollection { name: String },

    #[error("Invalid period: {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Invalid range for '{name}': [{low}, {high}]")]
    InvalidRange { name: String, low: f64, high: f64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BelResult<T> = Result<T, BelError>;
