// src/identity.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const IDENTITY_HASH_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity hash must be 8 hex characters, got {0:?}")]
    Malformed(String),
}

/// First eight lowercase hex characters of md5("<name>_<YYYYMMDD>").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityHash(String);

impl IdentityHash {
    pub fn compute(display_name: &str, birth_date: NaiveDate) -> Self {
        let input = format!("{}_{}", display_name, birth_date.format("%Y%m%d"));
        let digest = format!("{:x}", md5::compute(input.as_bytes()));
        IdentityHash(digest[..IDENTITY_HASH_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hash read as a hexadecimal integer.
    pub fn value(&self) -> u64 {
        // always valid hex once constructed
        u64::from_str_radix(&self.0, 16).unwrap_or_default()
    }

    /// Uppercase form shown on cards.
    pub fn handle(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IdentityHash {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == IDENTITY_HASH_LEN && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(IdentityHash(s.to_ascii_lowercase()))
        } else {
            Err(IdentityError::Malformed(s.to_string()))
        }
    }
}

impl TryFrom<String> for IdentityHash {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IdentityHash> for String {
    fn from(hash: IdentityHash) -> Self {
        hash.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub identity_hash: IdentityHash,
}

impl UserIdentity {
    pub fn new(display_name: impl Into<String>, birth_date: NaiveDate) -> Self {
        let display_name = display_name.into();
        let identity_hash = IdentityHash::compute(&display_name, birth_date);
        UserIdentity {
            display_name,
            birth_date,
            identity_hash,
        }
    }
}
