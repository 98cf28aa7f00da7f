use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountFormat {
    /// Nostro and per-type accounts.
    BondsterTechnical,
    BondsterOriginator,
    #[serde(rename = "IBAN")]
    Iban,
}

/// Account descriptor sent to the vault. Creation is an idempotent upsert
/// keyed by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub format: AccountFormat,
    pub currency: String,
    pub is_balance_check: bool,
}

impl Account {
    pub fn new(name: impl Into<String>, format: AccountFormat, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format,
            currency: currency.into(),
            is_balance_check: false,
        }
    }

    pub fn nostro(currency: &str) -> Self {
        Self::new(
            format!("{currency}_TYPE_NOSTRO"),
            AccountFormat::BondsterTechnical,
            currency,
        )
    }

    pub fn transaction_type(currency: &str, kind: &str) -> Self {
        Self::new(
            format!("{currency}_TYPE_{kind}"),
            AccountFormat::BondsterTechnical,
            currency,
        )
    }

    pub fn originator(currency: &str, name: &str) -> Self {
        Self::new(
            format!("{currency}_ORIGINATOR_{name}"),
            AccountFormat::BondsterOriginator,
            currency,
        )
    }

    /// Counterparty account identified by its normalized account number.
    pub fn external(currency: &str, account_number: &str, bank_code: &str) -> Self {
        Self::new(
            normalize_account_number(account_number, bank_code),
            AccountFormat::Iban,
            currency,
        )
    }
}

/// `<number>/<bankCode>` upper-cased with all whitespace removed, or the bare
/// number when the bank code is empty.
pub fn normalize_account_number(account_number: &str, bank_code: &str) -> String {
    let strip = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    };
    let number = strip(account_number);
    let bank = strip(bank_code);
    if bank.is_empty() {
        number
    } else {
        format!("{number}/{bank}")
    }
}
