use serde::{Deserialize, Serialize};

/// One side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPair {
    pub tenant: String,
    pub name: String,
}

impl AccountPair {
    pub fn new(tenant: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            name: name.into(),
        }
    }
}

/// A single leg of a ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    /// RFC3339 value date
    pub value_date: String,
    pub credit: AccountPair,
    pub debit: AccountPair,
    /// Decimal amount as string
    pub amount: String,
    pub currency: String,
}

/// Transaction payload accepted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub transfers: Vec<Transfer>,
}
