mod encrypted;
mod file;
mod memory;
mod statements;
mod tokens;

pub use encrypted::{load_identity, EncryptedStorage};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use statements::{Marker, StatementStore};
pub use tokens::TokenStore;

use std::io;

use crate::models::Id;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path {0:?}")]
    InvalidPath(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("storage I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("encryption failed for {path}: {message}")]
    Crypto { path: String, message: String },
}

impl StorageError {
    pub(crate) fn io(path: &str, source: io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Byte-level storage addressed by relative `/`-separated paths.
///
/// Every path segment must be a safe path segment (see
/// [`Id::is_path_safe`]). Directories are created on demand.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Names of the entries under `path`, sorted. A missing directory is
    /// empty. Hidden entries (leading `.`) are skipped.
    async fn list_directory(&self, path: &str) -> Result<Vec<String>, StorageError>;

    /// Returns `None` when the file does not exist.
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Atomically replaces the file.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Writes the file only if it does not exist yet, failing with
    /// [`StorageError::AlreadyExists`] otherwise.
    async fn write_file_exclusive(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Creates an empty file if missing. Existing content is untouched.
    async fn touch_file(&self, path: &str) -> Result<(), StorageError>;

    /// Removes a file or a whole directory tree. Missing paths are not an
    /// error.
    async fn delete_file(&self, path: &str) -> Result<(), StorageError>;
}

/// Splits a relative storage path into validated segments.
pub(crate) fn path_segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().all(|s| Id::is_path_safe(s)) {
        Ok(segments)
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_validates_each_segment() {
        assert_eq!(
            path_segments("token/a/value").unwrap(),
            vec!["token", "a", "value"]
        );
        assert!(path_segments("token/../value").is_err());
        assert!(path_segments("/token").is_err());
        assert!(path_segments("token//value").is_err());
        assert!(path_segments("").is_err());
    }
}
