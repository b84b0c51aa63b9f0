use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::ConnectivityError;
use crate::http::rest_get_json;
use crate::types::{Credential, QuotaStatus};

/// Where quota snapshots come from. Implementations must tolerate concurrent
/// calls for different credentials and repeated calls for the same one.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    async fn fetch(&self, credential: &Credential) -> Result<QuotaStatus, ConnectivityError>;
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    resources: Resources,
}

#[derive(Debug, Deserialize)]
struct Resources {
    core: CoreRate,
}

#[derive(Debug, Deserialize)]
struct CoreRate {
    limit: i64,
    remaining: i64,
    reset: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    login: Option<String>,
}

/// Reads the REST `core` bucket from `GET /rate_limit`.
#[derive(Clone)]
pub struct GitHubQuotaSource {
    client: Client,
    cfg: Arc<Config>,
}

impl GitHubQuotaSource {
    pub fn new(client: Client, cfg: Arc<Config>) -> Self {
        Self { client, cfg }
    }

    /// Finds the login a token belongs to.
    pub async fn resolve_login(&self, token: &str) -> Result<String, ConnectivityError> {
        let user: User = rest_get_json(&self.client, &self.cfg, token, "/user").await?;
        match user.login {
            Some(login) if !login.is_empty() => Ok(login),
            _ => Err(ConnectivityError::malformed(
                "GET /user returned empty login",
            )),
        }
    }
}

#[async_trait]
impl QuotaSource for GitHubQuotaSource {
    async fn fetch(&self, credential: &Credential) -> Result<QuotaStatus, ConnectivityError> {
        let body: RateLimitBody =
            rest_get_json(&self.client, &self.cfg, &credential.token, "/rate_limit").await?;
        let core = body.resources.core;
        let reset_at = DateTime::<Utc>::from_timestamp(core.reset, 0).ok_or_else(|| {
            ConnectivityError::malformed(format!("reset epoch {} out of range", core.reset))
        })?;
        QuotaStatus::new(core.limit, core.remaining, reset_at)
    }
}
