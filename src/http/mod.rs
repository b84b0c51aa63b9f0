use crate::config::Config;
use crate::error::ConnectivityError;
use log::debug;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Shared client for every credential; the bearer token is injected per request.
pub fn build_client(cfg: &Config) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()
}

fn auth_header(token: &str) -> Result<HeaderValue, ConnectivityError> {
    HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| ConnectivityError {
        code: "bad_request".into(),
        message: "token contains characters not allowed in a header".into(),
        retriable: false,
    })
}

pub fn map_status_to_error(status: StatusCode, message: String) -> ConnectivityError {
    let (code, retriable) = match status {
        StatusCode::BAD_REQUEST => ("bad_request", false),
        StatusCode::UNAUTHORIZED => ("unauthorized", false),
        StatusCode::FORBIDDEN => ("forbidden", false),
        StatusCode::NOT_FOUND => ("not_found", false),
        StatusCode::CONFLICT => ("conflict", false),
        StatusCode::TOO_MANY_REQUESTS => ("rate_limited", true),
        s if s.is_server_error() => ("upstream_error", true),
        _ => ("server_error", false),
    };
    ConnectivityError {
        code: code.to_string(),
        message,
        retriable,
    }
}

/// Single authenticated GET against the GitHub REST API, decoded as JSON.
/// No retries here: callers own their retry cadence.
pub async fn rest_get_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    cfg: &Config,
    token: &str,
    path: &str,
) -> Result<T, ConnectivityError> {
    let url = format!("{}{}", cfg.api_url, path);
    let res = client
        .get(&url)
        .header(AUTHORIZATION, auth_header(token)?)
        .header("X-GitHub-Api-Version", &cfg.api_version)
        .header(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        )
        .send()
        .await
        .map_err(|e| ConnectivityError::transport(e.to_string()))?;

    let status = res.status();
    let text = res
        .text()
        .await
        .map_err(|e| ConnectivityError::transport(e.to_string()))?;
    if !status.is_success() {
        debug!("REST GET {} failed with status {}", url, status);
        return Err(map_status_to_error(status, text));
    }
    serde_json::from_str(&text).map_err(|e| ConnectivityError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping_matrix() {
        assert_eq!(
            map_status_to_error(StatusCode::BAD_REQUEST, "".into()).code,
            "bad_request"
        );
        assert_eq!(
            map_status_to_error(StatusCode::UNAUTHORIZED, "".into()).code,
            "unauthorized"
        );
        assert_eq!(
            map_status_to_error(StatusCode::FORBIDDEN, "".into()).code,
            "forbidden"
        );
        assert_eq!(
            map_status_to_error(StatusCode::NOT_FOUND, "".into()).code,
            "not_found"
        );
        let rl = map_status_to_error(StatusCode::TOO_MANY_REQUESTS, "".into());
        assert_eq!(rl.code, "rate_limited");
        assert!(rl.retriable);
        let s5 = map_status_to_error(StatusCode::BAD_GATEWAY, "".into());
        assert_eq!(s5.code, "upstream_error");
        assert!(s5.retriable);
    }

    #[test]
    fn header_rejects_control_characters() {
        assert!(auth_header("abc\n").is_err());
        assert!(auth_header("ghp_abc123").is_ok());
    }
}
