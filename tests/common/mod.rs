#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use token_counter::error::{ConnectivityError, WriteError};
use token_counter::quota::QuotaSource;
use token_counter::reporter::UsageReporter;
use token_counter::tracker::Clock;
use token_counter::types::{Credential, Measurement, QuotaStatus};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub fn status(remaining: i64, reset_at: DateTime<Utc>) -> QuotaStatus {
    QuotaStatus::new(5000, remaining, reset_at).unwrap()
}

pub fn unreachable_err() -> ConnectivityError {
    ConnectivityError::transport("connection refused")
}

/// Wall-clock time that follows tokio's (possibly paused) clock from `start`.
pub struct TokioClock {
    start: DateTime<Utc>,
    origin: Instant,
}

impl TokioClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            origin: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap();
        self.start + elapsed
    }
}

/// Replays a fixed sequence of answers, then blocks forever.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<QuotaStatus, ConnectivityError>>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<QuotaStatus, ConnectivityError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Tokio time of every fetch, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuotaSource for ScriptedSource {
    async fn fetch(&self, _credential: &Credential) -> Result<QuotaStatus, ConnectivityError> {
        self.calls.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(answer) => answer,
            None => futures::future::pending().await,
        }
    }
}

/// Answers per login with a fixed value every time.
pub struct FixedSource {
    answers: HashMap<String, Result<QuotaStatus, ConnectivityError>>,
}

impl FixedSource {
    pub fn new(answers: Vec<(&str, Result<QuotaStatus, ConnectivityError>)>) -> Self {
        Self {
            answers: answers
                .into_iter()
                .map(|(login, a)| (login.to_string(), a))
                .collect(),
        }
    }
}

#[async_trait]
impl QuotaSource for FixedSource {
    async fn fetch(&self, credential: &Credential) -> Result<QuotaStatus, ConnectivityError> {
        self.answers
            .get(&credential.login)
            .cloned()
            .unwrap_or_else(|| Err(ConnectivityError::malformed("unknown login")))
    }
}

/// Every fetch consumes one more call than the last: `used = base + n` on the
/// n-th fetch (the first fetch is n = 0).
pub struct CountingSource {
    base: i64,
    calls: AtomicI64,
    reset_at: DateTime<Utc>,
}

impl CountingSource {
    pub fn new(base: i64, reset_at: DateTime<Utc>) -> Self {
        Self {
            base,
            calls: AtomicI64::new(0),
            reset_at,
        }
    }
}

#[async_trait]
impl QuotaSource for CountingSource {
    async fn fetch(&self, _credential: &Credential) -> Result<QuotaStatus, ConnectivityError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        QuotaStatus::new(5000, 5000 - self.base - n, self.reset_at)
    }
}

/// Forwards every push attempt to a channel; fails the first `failures` pushes.
pub struct RecordingReporter {
    tx: mpsc::UnboundedSender<Measurement>,
    failures: AtomicUsize,
}

impl RecordingReporter {
    pub fn new(failures: usize) -> (Self, mpsc::UnboundedReceiver<Measurement>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                failures: AtomicUsize::new(failures),
            },
            rx,
        )
    }
}

#[async_trait]
impl UsageReporter for RecordingReporter {
    async fn push(&self, measurement: &Measurement) -> Result<(), WriteError> {
        let _ = self.tx.send(measurement.clone());
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(WriteError {
                measurement: measurement.name.clone(),
                message: "status 500".into(),
            });
        }
        Ok(())
    }
}
