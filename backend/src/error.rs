// Error taxonomy shared by the table query engine, the importer and the handlers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    /// A statement failed to execute, or a cell formatter failed while the
    /// rows of a statement were being rendered.
    #[error("Query Failed! {message}")]
    Query {
        statement: String,
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// A required request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Uploaded file could not be saved or read.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The import transaction could not be committed.
    #[error("Import failed: {0}")]
    Import(String),

    #[error("{0}")]
    Password(String),

    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AdminError {
    pub fn query(statement: impl Into<String>, source: sqlx::Error) -> Self {
        AdminError::Query {
            statement: statement.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AdminError::Validation(msg.into())
    }

    /// Statement text attached to a query failure, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            AdminError::Query { statement, .. } => Some(statement),
            _ => None,
        }
    }

    /// Whether the underlying driver error is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        let source = match self {
            AdminError::Query {
                source: Some(source),
                ..
            } => source,
            AdminError::Database(source) => source,
            _ => return false,
        };
        source
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false)
    }
}
