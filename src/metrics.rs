use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

pub const USAGE_METRIC: &str = "quota_usage";
const USAGE_HELP: &str =
    "Number of counted API calls against the GitHub API within a reset window";

/// Tracker counters owned by the process. Registered once into an explicit
/// registry that the scrape handler later gathers from.
#[derive(Clone)]
pub struct Metrics {
    pub fetch_failures: IntCounterVec,
    pub resets: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            fetch_failures: IntCounterVec::new(
                Opts::new(
                    "quota_fetch_failures_total",
                    "Failed rate limit fetches inside the estimation loop",
                ),
                &["login"],
            )?,
            resets: IntCounterVec::new(
                Opts::new("quota_resets_total", "Reset boundaries observed"),
                &["login"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.fetch_failures.clone()))?;
        registry.register(Box::new(self.resets.clone()))?;
        Ok(())
    }
}

/// The usage gauge for one snapshot. Built per scrape and never registered, so
/// concurrent scrapes can't see each other's values.
pub fn usage_families(snapshot: &[(String, i64)]) -> prometheus::Result<Vec<MetricFamily>> {
    let gauge = IntGaugeVec::new(Opts::new(USAGE_METRIC, USAGE_HELP), &["login"])?;
    for (login, used) in snapshot {
        gauge.with_label_values(&[login.as_str()]).set(*used);
    }
    Ok(gauge.collect())
}
