//! Records the bootstrap sequence reads or creates.

use std::fmt;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 50;

/// A keystore account as tracked by the transaction manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    /// Next nonce the transaction manager will use.
    pub nonce: u64,
}

/// Presenter row for balance logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub address: String,
    pub balance: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters")]
    InvalidPasswordLength,
}

/// API user. The password is only ever held as a salted SHA-256 digest
/// (`{salt_hex}${digest_hex}`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    hashed_password: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, password: &str) -> Result<Self, UserError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(UserError::InvalidEmail(email.to_string()));
        }
        let len = password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(UserError::InvalidPasswordLength);
        }

        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);

        Ok(Self {
            email: email.to_string(),
            hashed_password: format!("{salt}${}", digest(&salt, password)),
            created_at: Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        match self.hashed_password.split_once('$') {
            Some((salt, expected)) => digest(salt, password) == expected,
            None => false,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("email", &self.email)
            .field("hashed_password", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// `hex(SHA256(salt || secret))`.
pub(crate) fn digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
