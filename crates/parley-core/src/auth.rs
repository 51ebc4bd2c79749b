//! Pluggable authentication.
//!
//! Front-ends gate the chat behind an [`Authenticator`]. [`CredentialTable`]
//! is an in-memory implementation fed from configuration; nothing here
//! carries built-in credentials.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("malformed credential entry: {0}")]
    Config(String),
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError>;
}

struct Entry {
    password: String,
    identity: Identity,
}

/// Email/password pairs held in memory.
#[derive(Default)]
pub struct CredentialTable {
    entries: HashMap<String, Entry>,
}

impl std::fmt::Debug for CredentialTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialTable({} users)", self.entries.len())
    }
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user. The display name defaults to the email's local part.
    pub fn insert(
        &mut self,
        email: impl Into<String>,
        password: impl Into<String>,
        name: Option<String>,
    ) -> &mut Self {
        let email = email.into();
        let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());
        let identity = Identity {
            id: (self.entries.len() + 1).to_string(),
            name,
            email: email.clone(),
            profile_picture: None,
        };
        self.entries.insert(
            email.to_lowercase(),
            Entry {
                password: password.into(),
                identity,
            },
        );
        self
    }

    /// Parse `email:password[:name]` entries separated by commas.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let mut table = Self::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut fields = entry.splitn(3, ':');
            let email = fields.next().unwrap_or_default().trim();
            let password = fields
                .next()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AuthError::Config(format!("{email}: missing password")))?;
            if !email.contains('@') {
                return Err(AuthError::Config(format!("{email}: not an email address")));
            }
            let name = fields.next().map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
            table.insert(email, password, name);
        }
        Ok(table)
    }

    /// Load from `key` (e.g. `PARLEY_CREDENTIALS`). Unset means no users.
    pub fn from_env(key: &str) -> Result<Self, AuthError> {
        match std::env::var(key) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Authenticator for CredentialTable {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let entry = self
            .entries
            .get(&credentials.email.trim().to_lowercase())
            .ok_or(AuthError::InvalidCredentials)?;
        if !constant_time_eq(entry.password.as_bytes(), credentials.password.as_bytes()) {
            debug!(email = %credentials.email, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(entry.identity.clone())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
