use std::path::PathBuf;
use thiserror::Error;

/// The quota source could not be reached or answered with something unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ConnectivityError {
    pub code: String,
    pub message: String,
    pub retriable: bool,
}

impl ConnectivityError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            code: "malformed_response".into(),
            message: message.into(),
            retriable: false,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: "upstream_error".into(),
            message: message.into(),
            retriable: true,
        }
    }
}

/// A measurement could not be handed to the usage store.
#[derive(Debug, Error)]
#[error("failed to push {measurement}: {message}")]
pub struct WriteError {
    pub measurement: String,
    pub message: String,
}

/// A credential could not be turned into a running tracker.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("can't open token file ({path}): {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("token file ({path}) is empty")]
    EmptyToken { path: PathBuf },
    #[error("failed to resolve login for token ({path}): {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: ConnectivityError,
    },
    #[error("couldn't get baseline rate limits for {login}: {source}")]
    Baseline {
        login: String,
        #[source]
        source: ConnectivityError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("missing {0}; required unless --prom-only is set")]
    MissingInflux(&'static str),
}

/// A metrics snapshot could not be completed; no partial data is published.
#[derive(Debug, Error)]
#[error("failed to fetch rate limits for login '{login}': {source}")]
pub struct CollectError {
    pub login: String,
    #[source]
    pub source: ConnectivityError,
}
