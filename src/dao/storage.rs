//! Errors shared by every document store backend.

use std::error::Error;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::DocumentError;

/// Result alias for document store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure reported by a [`GameStore`](crate::dao::game_store::GameStore),
/// whatever database sits behind it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("document store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The game document does not exist (never created or deleted).
    #[error("game `{id}` does not exist")]
    Missing { id: Uuid },
    /// The stored document cannot be decoded into a game.
    #[error("game `{id}` is malformed")]
    Malformed {
        id: Uuid,
        #[source]
        source: DocumentError,
    },
}

impl StorageError {
    /// Wrap any backend failure as [`StorageError::Unavailable`].
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_keeps_its_source() {
        let err = StorageError::unavailable("ping failed", std::io::Error::other("refused"));
        assert_eq!(err.to_string(), "document store unavailable: ping failed");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("refused"));
    }
}
