use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed input to a create, save or link.
    #[error("validation error: {0}")]
    Validation(String),

    /// A non-null foreign key points at a row that does not exist.
    #[error("dangling reference: {entity}.{column} -> {id}")]
    DanglingReference {
        entity: &'static str,
        column: &'static str,
        id: String,
    },

    /// The store rejected a write (unique, foreign key or not-null constraint).
    #[error("persistence error on {table}: {message}")]
    Persistence {
        table: &'static str,
        message: String,
    },

    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_dangling_reference(&self) -> bool {
        matches!(self, Self::DanglingReference { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    /// Map a failed write onto `Persistence` when SQLite reports a constraint
    /// violation; anything else stays a plain database error.
    pub(crate) fn from_write(table: &'static str, err: rusqlite::Error) -> Self {
        if matches!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        ) {
            Self::Persistence {
                table,
                message: err.to_string(),
            }
        } else {
            Self::Database(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
