use anyhow::{anyhow, bail, Context};
use log::{info, warn};
use prometheus::Registry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::collector::UsageCollector;
use crate::config::Config;
use crate::error::ProvisioningError;
use crate::http;
use crate::metrics::Metrics;
use crate::quota::{GitHubQuotaSource, QuotaSource};
use crate::reporter::{InfluxReporter, UsageReporter};
use crate::server::{self, MetricsState};
use crate::tracker::RateTracker;
use crate::types::Credential;

/// Reads a token file, trimming surrounding whitespace.
pub fn read_token(path: &Path) -> Result<String, ProvisioningError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ProvisioningError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(ProvisioningError::EmptyToken {
            path: path.to_path_buf(),
        });
    }
    Ok(token.to_string())
}

/// Resolves every token file to a tracker with a baseline, in order.
/// The first failure aborts.
pub async fn create_trackers(
    token_files: &[PathBuf],
    source: Arc<GitHubQuotaSource>,
    metrics: &Metrics,
) -> Result<Vec<Arc<RateTracker>>, ProvisioningError> {
    let mut trackers = Vec::with_capacity(token_files.len());
    for path in token_files {
        let token = read_token(path)?;
        let login = source
            .resolve_login(&token)
            .await
            .map_err(|source| ProvisioningError::Resolve {
                path: path.clone(),
                source,
            })?;
        let credential = Credential::new(login.clone(), token);
        let dyn_source: Arc<dyn QuotaSource> = source.clone();
        let tracker = RateTracker::initialize(credential, dyn_source, metrics)
            .await
            .map_err(|source| ProvisioningError::Baseline { login, source })?;
        info!("Tracking token for login '{}'", tracker.login());
        trackers.push(Arc::new(tracker));
    }
    Ok(trackers)
}

/// Builds everything from configuration and runs until one of the long-running
/// tasks (metrics server or a tracker) stops.
pub async fn run_program(cfg: Config) -> anyhow::Result<()> {
    let cfg = Arc::new(cfg);
    let client = http::build_client(&cfg).context("building HTTP client")?;

    let registry = Registry::new();
    let metrics = Metrics::new()?;
    metrics.register(&registry)?;

    let source = Arc::new(GitHubQuotaSource::new(client.clone(), cfg.clone()));
    let trackers = create_trackers(&cfg.token_files, source, &metrics).await?;
    if trackers.is_empty() {
        warn!("No token given, nothing to do. Leaving...");
        return Ok(());
    }

    let collector = Arc::new(UsageCollector::new(trackers.clone()));
    let addr = cfg.metrics_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding metrics listener on {}", addr))?;

    let mut tasks = JoinSet::new();
    let state = MetricsState::new(collector, registry);
    tasks.spawn(async move {
        server::serve(listener, state).await.context("metrics server failed")?;
        Err::<(), _>(anyhow!("metrics server returned"))
    });

    if cfg.prom_only {
        info!("Metrics-only mode; not pushing to InfluxDB");
    } else {
        let Some(influx) = cfg.influx.clone() else {
            bail!("InfluxDB is not configured");
        };
        let reporter: Arc<dyn UsageReporter> = Arc::new(InfluxReporter::new(client, influx));
        for tracker in &trackers {
            let tracker = tracker.clone();
            let reporter = reporter.clone();
            tasks.spawn(async move {
                tracker.run(reporter).await;
                Err::<(), _>(anyhow!("rate tracker for '{}' stopped", tracker.login()))
            });
        }
    }

    supervise(tasks).await
}

/// Waits on tasks that are meant to run forever. The first one to finish,
/// fail or panic ends the program; the rest are aborted when the set drops.
pub async fn supervise(mut tasks: JoinSet<anyhow::Result<()>>) -> anyhow::Result<()> {
    match tasks.join_next().await {
        Some(Ok(Ok(()))) => bail!("a long-running task returned"),
        Some(Ok(Err(e))) => Err(e),
        Some(Err(e)) if e.is_panic() => Err(e).context("a long-running task panicked"),
        Some(Err(e)) => Err(e).context("a long-running task was cancelled"),
        None => bail!("nothing to run"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "token-counter-{}-{}",
            std::process::id(),
            name
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn token_is_trimmed() {
        let path = temp_file("trimmed", "  ghp_abc\n");
        assert_eq!(read_token(&path).unwrap(), "ghp_abc");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn empty_and_missing_tokens_fail() {
        let path = temp_file("empty", "\n \n");
        assert!(matches!(
            read_token(&path),
            Err(ProvisioningError::EmptyToken { .. })
        ));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            read_token(Path::new("/nonexistent/token-counter/token")),
            Err(ProvisioningError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn supervise_fails_when_a_task_stops() {
        let mut tasks = JoinSet::new();
        tasks.spawn(futures::future::pending::<anyhow::Result<()>>());
        tasks.spawn(async { Err::<(), _>(anyhow!("rate tracker for 'octocat' stopped")) });
        let err = supervise(tasks).await.unwrap_err();
        assert!(err.to_string().contains("octocat"));
    }

    #[tokio::test]
    async fn supervise_fails_when_a_task_panics() {
        let mut tasks = JoinSet::new();
        tasks.spawn(futures::future::pending::<anyhow::Result<()>>());
        tasks.spawn(async {
            if true {
                panic!("tracker blew up");
            }
            Ok::<(), anyhow::Error>(())
        });
        let err = supervise(tasks).await.unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn supervise_treats_a_clean_exit_as_fatal() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { Ok::<(), anyhow::Error>(()) });
        assert!(supervise(tasks).await.is_err());
    }
}
