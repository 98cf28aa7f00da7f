//! Text protocol spoken with the message bus.
//!
//! A frame is `<to-region> <from-region> <to-name> <from-name> <payload>`;
//! the payload is an opcode followed by at most two arguments.

use std::fmt;

use secrecy::SecretString;

pub const SYNCHRONIZE_TOKEN: &str = "ST";
pub const CREATE_TOKEN: &str = "NT";
pub const DELETE_TOKEN: &str = "DT";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("empty message")]
    Empty,
    #[error("message has more than three parts")]
    TooLarge,
    #[error("unknown message {0:?}")]
    Unknown(String),
    #[error("invalid arguments for {0}")]
    InvalidArguments(&'static str),
    #[error("malformed frame {0:?}")]
    MalformedFrame(String),
}

/// Address of an actor on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub region: String,
    pub name: String,
}

impl Coordinates {
    pub fn new(region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: Coordinates,
    pub from: Coordinates,
    pub payload: String,
}

impl Envelope {
    pub fn parse(frame: &str) -> Result<Self, MessageError> {
        let malformed = || MessageError::MalformedFrame(frame.to_string());
        let mut parts = frame.trim_end_matches(['\r', '\n']).splitn(5, ' ');
        let mut next = || parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed);
        let to_region = next()?;
        let from_region = next()?;
        let to_name = next()?;
        let from_name = next()?;
        let payload = next()?;
        Ok(Self {
            to: Coordinates::new(to_region, to_name),
            from: Coordinates::new(from_region, from_name),
            payload: payload.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.to.region, self.from.region, self.to.name, self.from.name, self.payload
        )
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    CreateToken {
        username: String,
        password: SecretString,
    },
    DeleteToken,
    SynchronizeToken,
}

impl Command {
    /// Parses a payload. Runs of spaces separate parts; more than three parts
    /// is an error.
    pub fn parse(payload: &str) -> Result<Self, MessageError> {
        let parts: Vec<&str> = payload.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() > 3 {
            return Err(MessageError::TooLarge);
        }
        match parts.as_slice() {
            [] => Err(MessageError::Empty),
            [SYNCHRONIZE_TOKEN] => Ok(Command::SynchronizeToken),
            [DELETE_TOKEN] => Ok(Command::DeleteToken),
            [CREATE_TOKEN, username, password] => Ok(Command::CreateToken {
                username: username.to_string(),
                password: SecretString::from(password.to_string()),
            }),
            [CREATE_TOKEN, ..] => Err(MessageError::InvalidArguments(CREATE_TOKEN)),
            [SYNCHRONIZE_TOKEN, ..] => Err(MessageError::InvalidArguments(SYNCHRONIZE_TOKEN)),
            [DELETE_TOKEN, ..] => Err(MessageError::InvalidArguments(DELETE_TOKEN)),
            [other, ..] => Err(MessageError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    TokenCreated,
    TokenDeleted,
    Error,
}

impl Reply {
    pub fn code(self) -> &'static str {
        match self {
            Reply::TokenCreated => "TN",
            Reply::TokenDeleted => "TD",
            Reply::Error => "EE",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
