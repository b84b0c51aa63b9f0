//! Per-credential quota estimation.
//!
//! The only signal is periodic polling of the quota endpoint, so the tracker
//! tries to read `remaining` just before the window resets. Each sleep is half
//! of the time left until `reset_at`, which clusters samples near the boundary
//! while keeping the number of polls per window logarithmic.

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use prometheus::IntCounter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{MIN_POLL_INTERVAL, REACQUIRE_INTERVAL, SETTLE_DELAY};
use crate::error::ConnectivityError;
use crate::metrics::{Metrics, USAGE_METRIC};
use crate::quota::QuotaSource;
use crate::reporter::UsageReporter;
use crate::types::{Credential, FieldValue, Measurement, QuotaStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Same window, quota consumed monotonically; the sample is the new baseline.
    Advanced,
    /// The window closed. Carries the last snapshot taken inside it.
    Reset(QuotaStatus),
}

/// The estimation state machine without any I/O.
#[derive(Debug, Clone)]
pub struct Estimator {
    last_known: QuotaStatus,
}

impl Estimator {
    pub fn new(baseline: QuotaStatus) -> Self {
        Self {
            last_known: baseline,
        }
    }

    pub fn last_known(&self) -> &QuotaStatus {
        &self.last_known
    }

    /// Half the time left until the known reset, never below `MIN_POLL_INTERVAL`.
    pub fn next_wait(&self, now: DateTime<Utc>) -> Duration {
        let half = (self.last_known.reset_at - now) / 2;
        half.to_std()
            .unwrap_or(Duration::ZERO)
            .max(MIN_POLL_INTERVAL)
    }

    /// Feeds a successful sample into the machine.
    ///
    /// GitHub may refill `remaining` before it moves `reset`, so a rise in
    /// `remaining` counts as a reset even when the timestamp is unchanged.
    pub fn observe(&mut self, fresh: QuotaStatus) -> Observation {
        let last = self.last_known;
        if fresh.reset_at != last.reset_at || fresh.remaining > last.remaining {
            return Observation::Reset(last);
        }
        self.last_known = fresh;
        Observation::Advanced
    }

    /// Adopts a baseline for the next window after a reset.
    pub fn rearm(&mut self, baseline: QuotaStatus) {
        self.last_known = baseline;
    }
}

/// The point pushed for a closed window, stamped with that window's reset time.
pub fn usage_measurement(login: &str, closed: &QuotaStatus) -> Measurement {
    Measurement {
        name: USAGE_METRIC.to_string(),
        tags: BTreeMap::from([("login".to_string(), login.to_string())]),
        fields: BTreeMap::from([("value".to_string(), FieldValue::Int(closed.used()))]),
        timestamp: closed.reset_at,
    }
}

/// Source of "now" for the halving schedule.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tracks one credential. Shared between its own estimation task and the
/// scrape path; the loop keeps its state locally, so no locking is involved.
pub struct RateTracker {
    credential: Credential,
    source: Arc<dyn QuotaSource>,
    baseline: QuotaStatus,
    clock: Arc<dyn Clock>,
    fetch_failures: IntCounter,
    resets: IntCounter,
}

impl RateTracker {
    /// Fetches the initial baseline. Without it the loop can't be started.
    pub async fn initialize(
        credential: Credential,
        source: Arc<dyn QuotaSource>,
        metrics: &Metrics,
    ) -> Result<Self, ConnectivityError> {
        let baseline = source.fetch(&credential).await?;
        let login = credential.login.as_str();
        debug!(
            "{}: baseline limit={} remaining={} reset_at={}",
            login, baseline.limit, baseline.remaining, baseline.reset_at
        );
        Ok(Self {
            fetch_failures: metrics.fetch_failures.with_label_values(&[login]),
            resets: metrics.resets.with_label_values(&[login]),
            credential,
            source,
            baseline,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock the schedule is computed against.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn login(&self) -> &str {
        &self.credential.login
    }

    /// The snapshot taken by `initialize`.
    pub fn baseline(&self) -> QuotaStatus {
        self.baseline
    }

    /// Fresh snapshot, independent of the loop's cadence.
    pub async fn sample_now(&self) -> Result<QuotaStatus, ConnectivityError> {
        self.source.fetch(&self.credential).await
    }

    /// Runs the estimation loop. Never returns.
    ///
    /// One measurement is pushed per observed reset. Fetch and push failures
    /// are logged and the loop carries on.
    pub async fn run(&self, reporter: Arc<dyn UsageReporter>) {
        let login = self.login();
        let mut estimator = Estimator::new(self.baseline);
        loop {
            let wait = estimator.next_wait(self.clock.now());
            debug!("{}: next rate limit sample in {:?}", login, wait);
            sleep(wait).await;

            let fresh = match self.sample_now().await {
                Ok(s) => s,
                Err(e) => {
                    self.fetch_failures.inc();
                    error!("{}: failed to get core rate: {}", login, e);
                    continue;
                }
            };

            if let Observation::Reset(closed) = estimator.observe(fresh) {
                self.resets.inc();
                let point = usage_measurement(login, &closed);
                info!(
                    "{}: window ending {} closed with {} calls",
                    login,
                    closed.reset_at,
                    closed.used()
                );
                if let Err(e) = reporter.push(&point).await {
                    error!("{}: {}", login, e);
                }
                // Give upstream time to roll its counters over completely.
                sleep(SETTLE_DELAY).await;
                estimator.rearm(self.reacquire().await);
            }
        }
    }

    async fn reacquire(&self) -> QuotaStatus {
        loop {
            match self.sample_now().await {
                Ok(s) => return s,
                Err(e) => {
                    self.fetch_failures.inc();
                    error!("{}: failed to get core rate: {}", self.login(), e);
                    sleep(REACQUIRE_INTERVAL).await;
                }
            }
        }
    }
}
