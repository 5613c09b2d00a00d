//! SQLite error types

use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl SqliteError {
    /// True when the store rejected a row through a CHECK, NOT NULL,
    /// FOREIGN KEY or UNIQUE constraint
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(e)) => matches!(
                e.kind(),
                ErrorKind::CheckViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::UniqueViolation
            ),
            _ => false,
        }
    }
}
