use std::path::Path;

use anyhow::{Context, Result};
use age::x25519::{Identity, Recipient};

use super::{Storage, StorageError};

/// Reads an age x25519 identity file as produced by `age-keygen`.
///
/// Comment lines are skipped; the first `AGE-SECRET-KEY-` line is used.
pub fn load_identity(path: &Path) -> Result<Identity> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read identity file {}", path.display()))?;
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("AGE-SECRET-KEY-"))
        .with_context(|| format!("No age identity found in {}", path.display()))?;
    line.parse::<Identity>()
        .map_err(|e| anyhow::anyhow!("Invalid age identity in {}: {e}", path.display()))
}

/// Storage decorator that encrypts file contents with age before handing
/// them to the inner storage. Paths and directory structure stay visible.
pub struct EncryptedStorage<S> {
    inner: S,
    identity: Identity,
    recipient: Recipient,
}

impl<S: Storage> EncryptedStorage<S> {
    pub fn new(inner: S, identity: Identity) -> Self {
        let recipient = identity.to_public();
        Self {
            inner,
            identity,
            recipient,
        }
    }

    fn seal(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        age::encrypt(&self.recipient, data).map_err(|e| StorageError::Crypto {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn open(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        age::decrypt(&self.identity, data).map_err(|e| StorageError::Crypto {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage> Storage for EncryptedStorage<S> {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.exists(path).await
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list_directory(path).await
    }

    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.inner.read_file(path).await? {
            Some(sealed) => self.open(path, &sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let sealed = self.seal(path, data)?;
        self.inner.write_file(path, &sealed).await
    }

    async fn write_file_exclusive(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let sealed = self.seal(path, data)?;
        self.inner.write_file_exclusive(path, &sealed).await
    }

    async fn touch_file(&self, path: &str) -> Result<(), StorageError> {
        if self.inner.exists(path).await? {
            return Ok(());
        }
        let sealed = self.seal(path, &[])?;
        match self.inner.write_file_exclusive(path, &sealed).await {
            Err(StorageError::AlreadyExists(_)) => Ok(()),
            other => other,
        }
    }

    async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        self.inner.delete_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[tokio::test]
    async fn contents_are_encrypted_at_rest() {
        let storage = EncryptedStorage::new(MemoryStorage::new(), Identity::generate());

        storage.write_file("token/a/value", b"alice\nsecret").await.unwrap();

        let raw = storage.inner.read_file("token/a/value").await.unwrap().unwrap();
        assert!(raw.starts_with(b"age-encryption.org/v1"));
        assert!(!raw.windows(6).any(|w| w == b"secret"));

        let plain = storage.read_file("token/a/value").await.unwrap().unwrap();
        assert_eq!(plain, b"alice\nsecret");
    }

    #[tokio::test]
    async fn wrong_identity_fails_to_read() {
        let storage = EncryptedStorage::new(MemoryStorage::new(), Identity::generate());
        storage.write_file("f", b"data").await.unwrap();

        let raw = storage.inner.read_file("f").await.unwrap().unwrap();
        let other = EncryptedStorage::new(MemoryStorage::new(), Identity::generate());
        other.inner.write_file("f", &raw).await.unwrap();

        assert!(matches!(
            other.read_file("f").await,
            Err(StorageError::Crypto { .. })
        ));
    }

    #[test]
    fn load_identity_skips_comments() {
        let identity = Identity::generate();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# created: 2024-01-01T00:00:00Z").unwrap();
        writeln!(file, "# public key: {}", identity.to_public()).unwrap();
        writeln!(file, "{}", identity.to_string().expose_secret()).unwrap();

        let loaded = load_identity(file.path()).unwrap();
        assert_eq!(loaded.to_public().to_string(), identity.to_public().to_string());
    }

    #[test]
    fn load_identity_rejects_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_identity(file.path()).is_err());
    }
}
