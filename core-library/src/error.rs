use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Playlist {0} is read-only")]
    ReadOnlyPlaylist(String),
}

impl LibraryError {
    /// Failures of the backing store itself, as opposed to bad requests.
    ///
    /// Callers may degrade to an in-memory library when this returns `true`.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            LibraryError::StorageUnavailable(_)
                | LibraryError::Database(_)
                | LibraryError::Migration(_)
        )
    }

    pub(crate) fn not_found(entity_type: &str, id: &str) -> Self {
        LibraryError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_classified() {
        assert!(LibraryError::StorageUnavailable("closed".into()).is_storage_failure());
        assert!(LibraryError::Migration("bad".into()).is_storage_failure());
        assert!(LibraryError::Database(sqlx::Error::PoolClosed).is_storage_failure());

        assert!(!LibraryError::not_found("Song", "x").is_storage_failure());
        assert!(!LibraryError::ReadOnlyPlaylist("liked".into()).is_storage_failure());
    }
}
