use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Write as _;

use crate::config::InfluxConfig;
use crate::error::WriteError;
use crate::types::{FieldValue, Measurement};

/// Sink for per-window usage points. Failures are reported, never retried here.
#[async_trait]
pub trait UsageReporter: Send + Sync {
    async fn push(&self, measurement: &Measurement) -> Result<(), WriteError>;
}

/// Writes points through the InfluxDB 1.x `/write` endpoint.
pub struct InfluxReporter {
    client: Client,
    cfg: InfluxConfig,
}

impl InfluxReporter {
    pub fn new(client: Client, cfg: InfluxConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl UsageReporter for InfluxReporter {
    async fn push(&self, measurement: &Measurement) -> Result<(), WriteError> {
        let fail = |message: String| WriteError {
            measurement: measurement.name.clone(),
            message,
        };
        let url = format!("{}/write", self.cfg.url);
        let mut req = self
            .client
            .post(&url)
            .query(&[("db", self.cfg.database.as_str()), ("precision", "s")])
            .body(line_protocol(measurement));
        if let Some(user) = &self.cfg.user {
            req = req.basic_auth(user, self.cfg.password.as_ref());
        }
        let res = req.send().await.map_err(|e| fail(e.to_string()))?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let text = res.text().await.unwrap_or_default();
        Err(fail(format!("status {}: {}", status, text.trim())))
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn field_value(v: &FieldValue) -> String {
    match v {
        FieldValue::Int(i) => format!("{}i", i),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Str(s) => format!("\"{}\"", escape(s, &['"', '\\'])),
    }
}

/// Encodes one point in InfluxDB line protocol with second precision.
pub fn line_protocol(m: &Measurement) -> String {
    const KEY: &[char] = &[',', '=', ' '];
    let mut line = escape(&m.name, &[',', ' ']);
    for (k, v) in &m.tags {
        let _ = write!(line, ",{}={}", escape(k, KEY), escape(v, KEY));
    }
    let fields = m
        .fields
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k, KEY), field_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = write!(line, " {} {}", fields, m.timestamp.timestamp());
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    fn point(login: &str) -> Measurement {
        Measurement {
            name: "quota_usage".into(),
            tags: BTreeMap::from([("login".to_string(), login.to_string())]),
            fields: BTreeMap::from([("value".to_string(), FieldValue::Int(15))]),
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn encodes_integer_field_and_seconds() {
        assert_eq!(
            line_protocol(&point("octocat")),
            "quota_usage,login=octocat value=15i 1700000000"
        );
    }

    #[test]
    fn escapes_tag_specials() {
        assert_eq!(
            line_protocol(&point("a b,c=d")),
            "quota_usage,login=a\\ b\\,c\\=d value=15i 1700000000"
        );
    }

    #[test]
    fn quotes_string_fields() {
        let mut m = point("x");
        m.fields
            .insert("note".into(), FieldValue::Str("say \"hi\"".into()));
        assert!(line_protocol(&m).contains("note=\"say \\\"hi\\\"\",value=15i"));
    }
}
