use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConnectivityError;

// Canonical quota snapshot shared by the source, the tracker and the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl QuotaStatus {
    /// Build a snapshot, rejecting values outside `0 <= remaining <= limit`.
    pub fn new(
        limit: i64,
        remaining: i64,
        reset_at: DateTime<Utc>,
    ) -> Result<Self, ConnectivityError> {
        if remaining < 0 || remaining > limit {
            return Err(ConnectivityError::malformed(format!(
                "remaining {} outside 0..={}",
                remaining, limit
            )));
        }
        Ok(Self {
            limit,
            remaining,
            reset_at,
        })
    }

    /// Calls consumed in the current window.
    pub fn used(&self) -> i64 {
        self.limit - self.remaining
    }
}

/// A tracked principal. `login` is the display identity; `token` is the secret
/// used against the quota source and never appears in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub login: String,
    pub token: String,
}

impl Credential {
    pub fn new(login: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// One point handed to the usage reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}
