//! Transport abstractions for reaching the backend.

use crate::error::BackendError;
use crate::features::{DesiredStateBody, Feature};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Abstract JSON-over-HTTP style transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST `body` to `path` and return the decoded JSON reply.
    async fn post(&self, path: &str, body: Value) -> Result<Value, BackendError>;
}

/// Applies a deadline to every request of the wrapped transport.
pub struct Timed<T: Transport> {
    inner: Arc<T>,
    timeout: Duration,
}

impl<T: Transport> Timed<T> {
    pub fn new(inner: Arc<T>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for Timed<T> {
    async fn post(&self, path: &str, body: Value) -> Result<Value, BackendError> {
        match tokio::time::timeout(self.timeout, self.inner.post(path, body)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }
}

/// A request as it went over the wire.
#[derive(Clone, Debug)]
pub struct WireCall {
    pub path: String,
    pub body: Value,
    pub sent_at: Instant,
}

#[derive(Clone, Copy, Debug, Default)]
struct Record {
    state: bool,
    count: u64,
}

#[derive(Debug, Default)]
struct Concurrency {
    active: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

/// In-memory stand-in for the app's backend, for tests and simulation.
///
/// Holds the authoritative state and counter of every toggle it has seen and
/// answers the feature endpoints exactly as the real service does. Latency,
/// failures and disagreement with the requested state can be injected.
pub struct MemoryServer {
    records: RwLock<HashMap<(Feature, String), Record>>,
    latency: RwLock<Duration>,
    failures: Mutex<VecDeque<BackendError>>,
    disagreements: Mutex<HashMap<(Feature, String), u32>>,
    offline: RwLock<bool>,
    calls: Mutex<Vec<WireCall>>,
    concurrency: Mutex<Concurrency>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            latency: RwLock::new(Duration::ZERO),
            failures: Mutex::new(VecDeque::new()),
            disagreements: Mutex::new(HashMap::new()),
            offline: RwLock::new(false),
            calls: Mutex::new(Vec::new()),
            concurrency: Mutex::new(Concurrency::default()),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        let server = Self::new();
        server.set_latency(latency);
        server
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Set the authoritative state of a toggle.
    pub fn seed(&self, feature: Feature, id: impl ToString, state: bool, count: u64) {
        self.records
            .write()
            .insert((feature, id.to_string()), Record { state, count });
    }

    pub fn state_of(&self, feature: Feature, id: impl ToString) -> Option<(bool, u64)> {
        self.records
            .read()
            .get(&(feature, id.to_string()))
            .map(|r| (r.state, r.count))
    }

    /// Fail the next `times` requests with `error`.
    pub fn fail_next(&self, times: usize, error: BackendError) {
        let mut failures = self.failures.lock();
        failures.extend(std::iter::repeat(error).take(times));
    }

    /// Answer the next `times` requests for one toggle with the opposite of
    /// what was asked, as if another client kept overwriting it.
    pub fn disagree_next(&self, feature: Feature, id: impl ToString, times: u32) {
        self.disagreements
            .lock()
            .insert((feature, id.to_string()), times);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    pub fn calls(&self) -> Vec<WireCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, feature: Feature, id: impl ToString) -> Vec<WireCall> {
        let path = feature.path(&id.to_string());
        self.calls
            .lock()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }

    /// Highest number of simultaneously outstanding requests seen for one toggle.
    pub fn peak_concurrency(&self, feature: Feature, id: impl ToString) -> usize {
        let path = feature.path(&id.to_string());
        self.concurrency
            .lock()
            .peak
            .get(&path)
            .copied()
            .unwrap_or(0)
    }

    fn enter<'a>(&'a self, path: &'a str) -> Outstanding<'a> {
        let mut concurrency = self.concurrency.lock();
        let active = concurrency.active.entry(path.to_string()).or_insert(0);
        *active += 1;
        let now = *active;
        let peak = concurrency.peak.entry(path.to_string()).or_insert(0);
        *peak = (*peak).max(now);
        Outstanding { server: self, path }
    }

    fn apply(&self, path: &str, body: Value) -> Result<Value, BackendError> {
        let (feature, id) = Feature::parse_path(path).ok_or_else(|| BackendError::Server {
            status: 404,
            message: format!("no route for {}", path),
        })?;
        let request: DesiredStateBody =
            serde_json::from_value(body).map_err(|e| BackendError::Server {
                status: 400,
                message: e.to_string(),
            })?;

        let key = (feature, id.to_string());
        let disagree = {
            let mut disagreements = self.disagreements.lock();
            match disagreements.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        let mut records = self.records.write();
        let record = records.entry(key).or_default();
        let target = if disagree {
            !request.desired_state
        } else {
            request.desired_state
        };
        if record.state != target {
            record.count = if target {
                record.count.saturating_add(1)
            } else {
                record.count.saturating_sub(1)
            };
            record.state = target;
        }

        feature.ack_body(record.state, record.count)
    }
}

/// Counts a request as outstanding until dropped, including when the caller
/// gives up on it mid-flight.
struct Outstanding<'a> {
    server: &'a MemoryServer,
    path: &'a str,
}

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        if let Some(active) = self.server.concurrency.lock().active.get_mut(self.path) {
            *active = active.saturating_sub(1);
        }
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryServer {
    async fn post(&self, path: &str, body: Value) -> Result<Value, BackendError> {
        self.calls.lock().push(WireCall {
            path: path.to_string(),
            body: body.clone(),
            sent_at: Instant::now(),
        });
        let _outstanding = self.enter(path);

        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if *self.offline.read() {
            Err(BackendError::Unavailable("server offline".to_string()))
        } else if let Some(error) = self.failures.lock().pop_front() {
            Err(error)
        } else {
            self.apply(path, body)
        }
    }
}
