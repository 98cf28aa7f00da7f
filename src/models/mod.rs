mod account;
mod id;
mod statement;
mod token;
mod transaction;

pub use account::{normalize_account_number, Account, AccountFormat};
pub use id::{Id, IdError};
pub use statement::{Amount, Direction, ExternalAccount, Originator, Statement};
pub use token::{import_epoch, Token, TokenParseError};
pub use transaction::{AccountPair, Transaction, Transfer};
