use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::models::{Id, Token};

use super::{Storage, StorageError};

/// Persists [`Token`] records under `token/<id>/value`.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn value_path(id: &Id) -> String {
        format!("token/{id}/value")
    }

    /// Ids of all stored tokens. Directory names that are not valid ids are
    /// skipped.
    pub async fn list_ids(&self) -> Result<Vec<Id>> {
        let names = self
            .storage
            .list_directory("token")
            .await
            .context("Failed to list tokens")?;
        Ok(names
            .into_iter()
            .filter_map(|name| match Id::from_string_checked(name) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(error = %err, "Skipping token directory");
                    None
                }
            })
            .collect())
    }

    pub async fn load(&self, id: &Id) -> Result<Option<Token>> {
        let Some(data) = self
            .storage
            .read_file(&Self::value_path(id))
            .await
            .with_context(|| format!("Failed to read token {id}"))?
        else {
            return Ok(None);
        };
        let token = Token::deserialize(id.clone(), &data)
            .with_context(|| format!("Failed to parse token {id}"))?;
        Ok(Some(token))
    }

    /// Loads every readable token. Unreadable records are logged and skipped.
    pub async fn load_all(&self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        for id in self.list_ids().await? {
            match self.load(&id).await {
                Ok(Some(token)) => tokens.push(token),
                Ok(None) => {}
                Err(err) => warn!(token = %id, error = %err, "Skipping unreadable token"),
            }
        }
        Ok(tokens)
    }

    /// Persists a new token. Returns false when a record already exists.
    pub async fn create(&self, token: &Token) -> Result<bool> {
        match self
            .storage
            .write_file_exclusive(&Self::value_path(&token.id), &token.serialize())
            .await
        {
            Ok(()) => Ok(true),
            Err(StorageError::AlreadyExists(_)) => Ok(false),
            Err(err) => Err(err).with_context(|| format!("Failed to create token {}", token.id)),
        }
    }

    /// Overwrites an existing record. Returns false, writing nothing, when the
    /// token has been deleted in the meantime.
    pub async fn update(&self, token: &Token) -> Result<bool> {
        let path = Self::value_path(&token.id);
        if !self
            .storage
            .exists(&path)
            .await
            .with_context(|| format!("Failed to check token {}", token.id))?
        {
            return Ok(false);
        }
        self.storage
            .write_file(&path, &token.serialize())
            .await
            .with_context(|| format!("Failed to update token {}", token.id))?;
        Ok(true)
    }

    pub async fn delete(&self, id: &Id) -> Result<()> {
        self.storage
            .delete_file(&format!("token/{id}"))
            .await
            .with_context(|| format!("Failed to delete token {id}"))
    }
}
