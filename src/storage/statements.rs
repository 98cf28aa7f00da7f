use std::sync::Arc;

use crate::models::Id;

use super::{Storage, StorageError};

/// Files kept per statement. `Data` holds the raw gateway payload, the others
/// are empty progress markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Known,
    Data,
    Accounts,
    Transactions,
}

impl Marker {
    fn file_name(self) -> &'static str {
        match self {
            Marker::Known => "mark",
            Marker::Data => "data",
            Marker::Accounts => "accounts",
            Marker::Transactions => "transactions",
        }
    }
}

/// Per-token statement records in plaintext storage:
/// `token/<id>/statements/<currency>/<transferId>/{mark,data,accounts,transactions}`.
///
/// This is the durable work queue of the import; every marker is only ever
/// added, never removed.
#[derive(Clone)]
pub struct StatementStore {
    storage: Arc<dyn Storage>,
    token: Id,
}

impl StatementStore {
    pub fn new(storage: Arc<dyn Storage>, token: Id) -> Self {
        Self { storage, token }
    }

    fn currency_dir(&self, currency: &str) -> String {
        format!("token/{}/statements/{currency}", self.token)
    }

    fn path(&self, currency: &str, id: &str, marker: Marker) -> String {
        format!("{}/{id}/{}", self.currency_dir(currency), marker.file_name())
    }

    /// Transfer ids with any record for the currency, sorted.
    pub async fn ids(&self, currency: &str) -> Result<Vec<String>, StorageError> {
        self.storage.list_directory(&self.currency_dir(currency)).await
    }

    pub async fn has(&self, currency: &str, id: &str, marker: Marker) -> Result<bool, StorageError> {
        self.storage.exists(&self.path(currency, id, marker)).await
    }

    /// Ids that carry every marker in `with` and lack `without`.
    pub async fn ids_where(
        &self,
        currency: &str,
        with: &[Marker],
        without: Marker,
    ) -> Result<Vec<String>, StorageError> {
        let mut result = Vec::new();
        'ids: for id in self.ids(currency).await? {
            if self.has(currency, &id, without).await? {
                continue;
            }
            for marker in with {
                if !self.has(currency, &id, *marker).await? {
                    continue 'ids;
                }
            }
            result.push(id);
        }
        Ok(result)
    }

    pub async fn set(&self, currency: &str, id: &str, marker: Marker) -> Result<(), StorageError> {
        self.storage.touch_file(&self.path(currency, id, marker)).await
    }

    /// Persists the raw payload unless one is already stored. Returns whether
    /// this call wrote it.
    pub async fn store_data(&self, currency: &str, id: &str, data: &[u8]) -> Result<bool, StorageError> {
        match self
            .storage
            .write_file_exclusive(&self.path(currency, id, Marker::Data), data)
            .await
        {
            Ok(()) => Ok(true),
            Err(StorageError::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn data(&self, currency: &str, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.storage
            .read_file(&self.path(currency, id, Marker::Data))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, StatementStore) {
        let storage = Arc::new(MemoryStorage::new());
        let statements = StatementStore::new(storage.clone(), Id::from_string("tok"));
        (storage, statements)
    }

    #[tokio::test]
    async fn layout_matches_token_statement_tree() {
        let (storage, statements) = store();
        statements.set("CZK", "42", Marker::Known).await.unwrap();
        assert!(statements.store_data("CZK", "42", b"{}").await.unwrap());

        assert_eq!(
            storage.paths(),
            vec![
                "token/tok/statements/CZK/42/data",
                "token/tok/statements/CZK/42/mark"
            ]
        );
    }

    #[tokio::test]
    async fn data_is_write_once() {
        let (_, statements) = store();
        assert!(statements.store_data("EUR", "1", b"first").await.unwrap());
        assert!(!statements.store_data("EUR", "1", b"second").await.unwrap());
        assert_eq!(statements.data("EUR", "1").await.unwrap().unwrap(), b"first");
    }

    #[tokio::test]
    async fn ids_where_filters_by_markers() {
        let (_, statements) = store();
        for id in ["1", "2", "3"] {
            statements.set("CZK", id, Marker::Known).await.unwrap();
        }
        statements.store_data("CZK", "1", b"{}").await.unwrap();
        statements.store_data("CZK", "2", b"{}").await.unwrap();
        statements.set("CZK", "2", Marker::Accounts).await.unwrap();

        assert_eq!(
            statements.ids_where("CZK", &[], Marker::Data).await.unwrap(),
            vec!["3"]
        );
        assert_eq!(
            statements
                .ids_where("CZK", &[Marker::Data], Marker::Accounts)
                .await
                .unwrap(),
            vec!["1"]
        );
        assert_eq!(
            statements
                .ids_where("CZK", &[Marker::Data, Marker::Accounts], Marker::Transactions)
                .await
                .unwrap(),
            vec!["2"]
        );
    }
}
