use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Account, AccountPair, Transaction, Transfer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Originator {
    pub id_originator: String,
    pub originator_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAccount {
    pub account_number: String,
    #[serde(default)]
    pub bank_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    pub amount: Decimal,
    pub currency_code: String,
}

/// A brokerage statement as returned by the gateway's transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub id_transaction: String,
    pub id_transfer: String,
    pub transaction_type: String,
    pub direction: Direction,
    #[serde(default)]
    pub loan_number: Option<String>,
    pub value_date: DateTime<Utc>,
    #[serde(default)]
    pub originator: Option<Originator>,
    #[serde(default)]
    pub external_account: Option<ExternalAccount>,
    pub amount: Amount,
    #[serde(default)]
    pub storno: bool,
}

impl Statement {
    /// Vault accounts this statement touches. Nostro always comes first.
    pub fn accounts(&self, currency: &str) -> Vec<Account> {
        let mut accounts = vec![
            Account::nostro(currency),
            Account::transaction_type(currency, &self.transaction_type),
        ];
        if let Some(originator) = &self.originator {
            accounts.push(Account::originator(currency, &originator.originator_name));
        }
        if let Some(external) = &self.external_account {
            accounts.push(Account::external(
                currency,
                &external.account_number,
                &external.bank_code,
            ));
        }
        accounts
    }

    /// Builds the ledger transaction for this statement.
    ///
    /// Statements routed through an originator produce two legs: the money
    /// moves between nostro and the originator, then is forwarded between the
    /// originator and the type account in a `<id>_FWD` leg.
    pub fn transaction(&self, tenant: &str, currency: &str) -> Transaction {
        let nostro = AccountPair::new(tenant, format!("{currency}_TYPE_NOSTRO"));
        let kind = AccountPair::new(
            tenant,
            format!("{currency}_TYPE_{}", self.transaction_type),
        );

        let legs = match &self.originator {
            None => match self.direction {
                Direction::Credit => vec![(self.id_transfer.clone(), nostro, kind)],
                Direction::Debit => vec![(self.id_transfer.clone(), kind, nostro)],
            },
            Some(originator) => {
                let via = AccountPair::new(
                    tenant,
                    format!("{currency}_ORIGINATOR_{}", originator.originator_name),
                );
                let forward_id = format!("{}_FWD", self.id_transfer);
                match self.direction {
                    Direction::Credit => vec![
                        (self.id_transfer.clone(), nostro, via.clone()),
                        (forward_id, via, kind),
                    ],
                    Direction::Debit => vec![
                        (self.id_transfer.clone(), via.clone(), nostro),
                        (forward_id, kind, via),
                    ],
                }
            }
        };

        let value_date = self.value_date.to_rfc3339_opts(SecondsFormat::Secs, true);
        let amount = self.amount.amount.normalize().to_string();
        Transaction {
            id: self.id_transfer.clone(),
            transfers: legs
                .into_iter()
                .map(|(id, credit, debit)| Transfer {
                    id,
                    value_date: value_date.clone(),
                    credit,
                    debit,
                    amount: amount.clone(),
                    currency: self.amount.currency_code.clone(),
                })
                .collect(),
        }
    }
}
