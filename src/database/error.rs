use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    Connection,
    Query,
    NotFound,
    Migration,
}

#[derive(Debug, Clone, Error)]
#[error("database error ({kind:?}): {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
    pub is_retryable: bool,
}

impl DatabaseError {
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self {
                kind: DatabaseErrorKind::NotFound,
                message: error.to_string(),
                is_retryable: false,
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self {
                kind: DatabaseErrorKind::Connection,
                message: error.to_string(),
                is_retryable: true,
            },
            _ => Self {
                kind: DatabaseErrorKind::Query,
                message: error.to_string(),
                is_retryable: false,
            },
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self {
            kind: DatabaseErrorKind::Migration,
            message: message.into(),
            is_retryable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert_eq!(err.kind, DatabaseErrorKind::NotFound);
        assert!(!err.is_retryable);
    }

    #[test]
    fn pool_timeout_is_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, DatabaseErrorKind::Connection);
        assert!(err.is_retryable);
    }
}
