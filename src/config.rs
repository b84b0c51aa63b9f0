use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::cli::CliOptions;
use crate::error::ConfigError;

/// Wait after an observed reset before polling the quota source again.
pub const SETTLE_DELAY: Duration = Duration::from_secs(30 * 60);
/// Retry interval while re-acquiring a baseline after the settle delay.
pub const REACQUIRE_INTERVAL: Duration = Duration::from_secs(60);
/// Floor for the halving schedule once the reset time has passed.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Connection settings for the InfluxDB 1.x write endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxConfig {
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Runtime configuration.
/// CLI values take precedence; the rest is sourced from environment variables
/// with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_version: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub token_files: Vec<PathBuf>,
    pub host: String,
    pub metrics_port: u16,
    pub prom_only: bool,
    pub influx: Option<InfluxConfig>,
}

impl Config {
    /// Load configuration from CLI options and the process environment.
    ///
    /// Env vars:
    /// - GITHUB_API_URL (default: https://api.github.com)
    /// - GITHUB_API_VERSION (default: 2022-11-28)
    /// - GITHUB_HTTP_TIMEOUT_SECS (default: 30)
    /// - GITHUB_USER_AGENT (default: token-counter/<version>)
    /// - INFLUX_URL, INFLUX_DATABASE [required unless --prom-only]
    /// - INFLUX_USER, INFLUX_PASSWORD
    pub fn load(opts: &CliOptions) -> Result<Self, ConfigError> {
        Self::from_lookup(opts, |k| env::var(k).ok())
    }

    pub fn from_lookup<F>(opts: &CliOptions, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("GITHUB_API_URL")
            .unwrap_or_else(|| "https://api.github.com".to_string())
            .trim_end_matches('/')
            .to_string();
        check_url("GITHUB_API_URL", &api_url)?;
        let api_version =
            lookup("GITHUB_API_VERSION").unwrap_or_else(|| "2022-11-28".to_string());
        let timeout_secs = match lookup("GITHUB_HTTP_TIMEOUT_SECS") {
            Some(s) => s.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "GITHUB_HTTP_TIMEOUT_SECS",
                value: s,
            })?,
            None => 30,
        };
        let user_agent = lookup("GITHUB_USER_AGENT")
            .unwrap_or_else(|| format!("token-counter/{}", env!("CARGO_PKG_VERSION")));

        let metrics_port = match &opts.metrics_port {
            Some(p) => p.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "--metrics-port",
                value: p.clone(),
            })?,
            None => DEFAULT_METRICS_PORT,
        };
        let host = opts.host.clone().unwrap_or_default();

        let influx_url = opts.influx_url.clone().or_else(|| lookup("INFLUX_URL"));
        let influx_database = opts
            .influx_database
            .clone()
            .or_else(|| lookup("INFLUX_DATABASE"));
        let influx = match (influx_url, influx_database) {
            (Some(url), Some(database)) => Some(InfluxConfig {
                url: check_url("INFLUX_URL", url.trim_end_matches('/'))?,
                database,
                user: opts.influx_user.clone().or_else(|| lookup("INFLUX_USER")),
                password: opts
                    .influx_password
                    .clone()
                    .or_else(|| lookup("INFLUX_PASSWORD")),
            }),
            _ if opts.prom_only => None,
            (None, _) => return Err(ConfigError::MissingInflux("INFLUX_URL")),
            (Some(_), None) => return Err(ConfigError::MissingInflux("INFLUX_DATABASE")),
        };

        Ok(Self {
            api_url,
            api_version,
            user_agent,
            timeout_secs,
            token_files: opts.tokens.clone(),
            host,
            metrics_port,
            prom_only: opts.prom_only,
            influx,
        })
    }

    /// Address for the metrics listener; an empty host binds all interfaces.
    pub fn metrics_addr(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, self.metrics_port)
    }
}

fn check_url(name: &'static str, value: &str) -> Result<String, ConfigError> {
    match Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(value.to_string()),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}
