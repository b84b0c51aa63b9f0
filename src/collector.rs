use futures::future::try_join_all;
use log::error;
use std::sync::Arc;

use crate::error::CollectError;
use crate::tracker::RateTracker;

/// On-demand usage snapshot across every tracked credential.
///
/// Each call fetches fresh quota state; nothing is cached between scrapes.
pub struct UsageCollector {
    trackers: Vec<Arc<RateTracker>>,
}

impl UsageCollector {
    pub fn new(trackers: Vec<Arc<RateTracker>>) -> Self {
        Self { trackers }
    }

    /// `(login, limit - remaining)` per tracker, in tracker order.
    /// One failed sample fails the whole snapshot.
    pub async fn collect(&self) -> Result<Vec<(String, i64)>, CollectError> {
        try_join_all(self.trackers.iter().map(|tracker| async move {
            match tracker.sample_now().await {
                Ok(status) => Ok((tracker.login().to_string(), status.used())),
                Err(source) => {
                    error!(
                        "Failed to fetch rate limits for login '{}': {}",
                        tracker.login(),
                        source
                    );
                    Err(CollectError {
                        login: tracker.login().to_string(),
                        source,
                    })
                }
            }
        }))
        .await
    }
}
