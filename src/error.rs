use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("Missing reference: {kind} {id} does not exist")]
    MissingReference { kind: &'static str, id: String },
    #[error("Class {class} is full ({capacity} seats)")]
    ClassFull { class: String, capacity: i32 },
    #[error("Class {class} already has {enrolled} students, capacity {capacity} is too small")]
    CapacityBelowEnrollment {
        class: String,
        capacity: i32,
        enrolled: usize,
    },
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for environment variable {var}: {reason}")]
    InvalidEnvValue { var: String, reason: String },
    #[error("Store request failed: {0}")]
    Upstream(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Import failed: {0}")]
    Import(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn missing(kind: &'static str, id: impl ToString) -> Self {
        AppError::MissingReference {
            kind,
            id: id.to_string(),
        }
    }

    /// Store failures leave the snapshot untouched and can simply be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Upstream(_))
    }
}
