use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{path_segments, Storage, StorageError};

/// Plain file storage rooted at a directory.
///
/// Writes go to a hidden temporary sibling first and are then renamed (or
/// hard-linked, for exclusive writes) into place, so readers never observe a
/// partially written file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut full = self.root.clone();
        for segment in path_segments(path)? {
            full.push(segment);
        }
        Ok(full)
    }

    async fn ensure_parent(&self, path: &str, full: &Path) -> Result<(), StorageError> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(path, e))?;
        }
        Ok(())
    }

    /// Writes `data` to a fresh temporary file next to `full`.
    async fn write_temp(&self, path: &str, full: &Path, data: &[u8]) -> Result<PathBuf, StorageError> {
        self.ensure_parent(path, full).await?;
        let name = full
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let temp = full.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()));

        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok(temp)
    }
}

#[async_trait::async_trait]
impl Storage for FileStorage {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        fs::try_exists(&full)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let full = self.resolve(path)?;
        let mut entries = match fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(path, e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let temp = self.write_temp(path, &full, data).await?;
        if let Err(e) = fs::rename(&temp, &full).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::io(path, e));
        }
        Ok(())
    }

    async fn write_file_exclusive(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let temp = self.write_temp(path, &full, data).await?;
        // hard_link fails if the target exists, which makes the publish atomic
        let linked = fs::hard_link(&temp, &full).await;
        let _ = fs::remove_file(&temp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(path.to_string()))
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn touch_file(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        self.ensure_parent(path, &full).await?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let metadata = match fs::symlink_metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        let result = if metadata.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}
