//! core identity types shared by the configuration and reference backends.

use std::fmt;

use chrono::{DateTime, Utc};

/// Size of a raw object identifier in bytes.
pub const OBJECT_ID_SIZE: usize = 20;

/// A content identifier: the 20 raw bytes a direct reference points at.
///
/// This makes sure we don't accidentally pass a reference name where an
/// object identifier is expected. Hex parsing and formatting are the only
/// interpretations the bridge ever applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_SIZE]);

impl ObjectId {
    /// create an ObjectId from raw bytes
    pub fn from_bytes(bytes: [u8; OBJECT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// parse an ObjectId from a 40-character hex string
    pub fn from_hex(hex: &str) -> Result<Self, InvalidIdError> {
        if hex.len() != OBJECT_ID_SIZE * 2 {
            return Err(InvalidIdError::WrongLength(hex.len()));
        }

        let mut bytes = [0u8; OBJECT_ID_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &hex[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                let bad = pair
                    .chars()
                    .find(|c| !c.is_ascii_hexdigit())
                    .unwrap_or_else(|| pair.chars().next().unwrap_or('?'));
                InvalidIdError::InvalidHexDigit {
                    char: bad,
                    position: i * 2,
                }
            })?;
        }

        Ok(Self(bytes))
    }

    /// the all-zero identifier, used as a placeholder in symbolic records
    pub fn zero() -> Self {
        Self([0u8; OBJECT_ID_SIZE])
    }

    /// check whether this is the all-zero identifier
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// raw bytes
    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_SIZE] {
        &self.0
    }

    /// short form (first 7 hex digits)
    pub fn short(&self) -> String {
        self.to_string()[..7].to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A validated reference name.
///
/// Reference names are keys into the host's reference store and travel
/// across the native boundary as C strings, so they are restricted up
/// front rather than at every crossing.
///
/// Valid names:
/// - non-empty, at most 1024 bytes
/// - no `..` component and no leading/trailing `/`
/// - no ASCII control characters, no spaces, no interior NUL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// create a new RefName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if name.len() > 1024 {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if name.starts_with('/') || name.ends_with('/') || name.contains("..") {
            return Err(InvalidNameError::InvalidPath(name.to_string()));
        }

        for (i, c) in name.chars().enumerate() {
            if c.is_ascii_control() || c == ' ' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity attached to a reference update (author of the change).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

impl Signature {
    /// create a signature with an explicit timestamp
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// create a signature stamped with the current time
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Utc::now())
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::now("gitbridge", "gitbridge@localhost")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// error type for invalid reference names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} bytes", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}

/// error type for malformed object identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidIdError {
    WrongLength(usize),
    InvalidHexDigit { char: char, position: usize },
}

impl fmt::Display for InvalidIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(len) => {
                write!(f, "expected {} hex digits, got {}", OBJECT_ID_SIZE * 2, len)
            }
            Self::InvalidHexDigit { char, position } => {
                write!(f, "invalid hex digit '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidIdError {}
