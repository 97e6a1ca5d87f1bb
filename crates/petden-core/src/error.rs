use thiserror::Error;

#[derive(Error, Debug)]
pub enum PetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Write contention: {0}")]
    Contention(String),
}

/// Who is to blame for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Bad input, bad credentials, or a uniqueness conflict. Nothing was changed.
    Client,
    /// The caller (or the requested resource) has no pet/user record.
    NotFound,
    /// Storage or other infrastructure failure.
    Server,
}

impl PetError {
    pub fn fault(&self) -> Fault {
        match self {
            PetError::Validation(_) | PetError::Conflict(_) | PetError::Unauthorized(_) => {
                Fault::Client
            }
            PetError::NotFound(_) => Fault::NotFound,
            PetError::Io(_)
            | PetError::Database(_)
            | PetError::Csv(_)
            | PetError::Json(_)
            | PetError::Config(_)
            | PetError::Data(_)
            | PetError::Contention(_) => Fault::Server,
        }
    }

    /// True when SQLite rejected a write because of a UNIQUE constraint.
    pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

pub type Result<T> = std::result::Result<T, PetError>;
