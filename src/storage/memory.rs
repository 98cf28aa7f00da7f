//! In-memory storage implementation for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{path_segments, Storage, StorageError};

/// In-memory storage for testing purposes. Directories exist implicitly while
/// they contain at least one file.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn children_prefix(path: &str) -> String {
    format!("{path}/")
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        path_segments(path)?;
        let prefix = children_prefix(path);
        let files = self.lock();
        Ok(files.contains_key(path) || files.keys().any(|k| k.starts_with(&prefix)))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, StorageError> {
        path_segments(path)?;
        let prefix = children_prefix(path);
        let files = self.lock();
        let names: BTreeSet<String> = files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.starts_with('.'))
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        path_segments(path)?;
        Ok(self.lock().get(path).cloned())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        path_segments(path)?;
        self.lock().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn write_file_exclusive(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        path_segments(path)?;
        let mut files = self.lock();
        if files.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn touch_file(&self, path: &str) -> Result<(), StorageError> {
        path_segments(path)?;
        self.lock().entry(path.to_string()).or_default();
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        path_segments(path)?;
        let prefix = children_prefix(path);
        self.lock()
            .retain(|k, _| k != path && !k.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_immediate_children_once() {
        let storage = MemoryStorage::new();
        storage.touch_file("s/CZK/1/mark").await.unwrap();
        storage.write_file("s/CZK/1/data", b"{}").await.unwrap();
        storage.touch_file("s/CZK/2/mark").await.unwrap();
        storage.touch_file("s/EUR/9/mark").await.unwrap();

        assert_eq!(storage.list_directory("s").await.unwrap(), vec!["CZK", "EUR"]);
        assert_eq!(storage.list_directory("s/CZK").await.unwrap(), vec!["1", "2"]);
        assert!(storage.exists("s/CZK/1").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_subtree() {
        let storage = MemoryStorage::new();
        storage.write_file("token/a/value", b"x").await.unwrap();
        storage.write_file("token/ab/value", b"y").await.unwrap();

        storage.delete_file("token/a").await.unwrap();
        assert_eq!(storage.paths(), vec!["token/ab/value"]);
    }

    #[tokio::test]
    async fn exclusive_write_conflicts() {
        let storage = MemoryStorage::new();
        storage.write_file_exclusive("f", b"1").await.unwrap();
        assert!(matches!(
            storage.write_file_exclusive("f", b"2").await,
            Err(StorageError::AlreadyExists(_))
        ));
    }
}
