use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};

use super::Id;

const CURSOR_DATE_FORMAT: &str = "%d/%m/%Y";

/// Where every newly discovered currency starts synchronizing from.
pub fn import_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("token record has {0} lines, expected at least 3")]
    Truncated(usize),
    #[error("token record is not valid UTF-8")]
    Encoding,
}

/// A Bondster credential together with its per-currency sync cursors.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: Id,
    pub username: String,
    pub password: SecretString,
    pub created_at: DateTime<Utc>,
    cursors: BTreeMap<String, DateTime<Utc>>,
}

impl Token {
    pub fn new(
        id: Id,
        username: impl Into<String>,
        password: SecretString,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            password,
            created_at,
            cursors: BTreeMap::new(),
        }
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.cursors.keys().map(String::as_str)
    }

    pub fn cursor(&self, currency: &str) -> Option<DateTime<Utc>> {
        self.cursors.get(currency).copied()
    }

    /// Registers a currency at the import epoch. Returns false when it was
    /// already known.
    pub fn add_currency(&mut self, currency: &str) -> bool {
        if self.cursors.contains_key(currency) {
            return false;
        }
        self.cursors.insert(currency.to_string(), import_epoch());
        true
    }

    /// Moves the cursor forward to the start of the day of `at`. Returns false
    /// when that would not move it forward.
    ///
    /// Cursors are persisted with day granularity, so the in-memory value is
    /// truncated the same way.
    pub fn advance_cursor(&mut self, currency: &str, at: DateTime<Utc>) -> bool {
        let at = start_of_day(at);
        match self.cursors.get_mut(currency) {
            Some(current) if *current >= at => false,
            Some(current) => {
                *current = at;
                true
            }
            None => {
                self.cursors.insert(currency.to_string(), at);
                true
            }
        }
    }

    /// Line oriented record: creation time, username, password, then one
    /// `<currency> <DD/MM/YYYY>` line per cursor.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&self.created_at.to_rfc3339());
        out.push('\n');
        out.push_str(&self.username);
        out.push('\n');
        out.push_str(self.password.expose_secret());
        for (currency, at) in &self.cursors {
            out.push('\n');
            out.push_str(currency);
            out.push(' ');
            out.push_str(&at.format(CURSOR_DATE_FORMAT).to_string());
        }
        out.into_bytes()
    }

    pub fn deserialize(id: Id, data: &[u8]) -> Result<Self, TokenParseError> {
        let text = std::str::from_utf8(data).map_err(|_| TokenParseError::Encoding)?;
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < 3 {
            return Err(TokenParseError::Truncated(lines.len()));
        }

        let created_at = DateTime::parse_from_rfc3339(lines[0])
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| import_epoch());

        let mut token = Token::new(
            id,
            lines[1],
            SecretString::from(lines[2].to_string()),
            created_at,
        );

        for line in &lines[3..] {
            let Some((currency, date)) = line.trim().split_once(' ') else {
                continue;
            };
            if currency.is_empty() {
                continue;
            }
            let at = NaiveDate::parse_from_str(date.trim(), CURSOR_DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
                .unwrap_or_else(import_epoch);
            token.cursors.insert(currency.to_string(), at);
        }

        Ok(token)
    }
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(at)
}
