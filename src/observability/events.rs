//! Request and health events, and the sinks that receive them.
//!
//! # Responsibilities
//! - Define the records the dispatcher and health monitor report
//! - Fan events out to metrics and the optional JSON-lines event log
//!
//! # Design Decisions
//! - Sinks are synchronous and infallible from the caller's view
//! - The event log never blocks: records are dropped when its queue is full

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::load_balancer::Algorithm;

/// Outcome of one dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEvent {
    pub client_addr: Option<String>,
    pub method: String,
    pub path: String,
    /// Backend that served the request, `None` when nothing was alive.
    pub backend: Option<String>,
    pub algorithm: Algorithm,
    pub latency_ms: u64,
    pub status: u16,
}

/// Outcome of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthEvent {
    pub backend: String,
    pub alive: bool,
    pub latency_ms: u64,
}

/// Receives events from the request path and the health monitor.
pub trait EventSink: Send + Sync {
    fn record_request(&self, event: &RequestEvent);

    fn record_health(&self, event: &HealthEvent);

    /// Current in-flight count for a backend after it changed.
    fn record_connections(&self, _backend: &str, _active: i64) {}
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record_request(&self, _event: &RequestEvent) {}
    fn record_health(&self, _event: &HealthEvent) {}
}

/// Forwards every event to each inner sink in order.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Fanout {
    fn record_request(&self, event: &RequestEvent) {
        for sink in &self.sinks {
            sink.record_request(event);
        }
    }

    fn record_health(&self, event: &HealthEvent) {
        for sink in &self.sinks {
            sink.record_health(event);
        }
    }

    fn record_connections(&self, backend: &str, active: i64) {
        for sink in &self.sinks {
            sink.record_connections(backend, active);
        }
    }
}

/// A line in the event log.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRecord {
    Request {
        timestamp_ms: u64,
        #[serde(flatten)]
        event: RequestEvent,
    },
    Health {
        timestamp_ms: u64,
        #[serde(flatten)]
        event: HealthEvent,
    },
}

const EVENT_LOG_QUEUE: usize = 1024;

/// Appends events to a JSON-lines file from a background task.
#[derive(Debug, Clone)]
pub struct EventLog {
    tx: mpsc::Sender<LogRecord>,
}

impl EventLog {
    /// Open (or create) `path` for appending and spawn the writer task.
    ///
    /// Must be called from within a Tokio runtime. The writer exits once every
    /// `EventLog` clone has been dropped.
    pub async fn open(path: &Path) -> std::io::Result<(Self, JoinHandle<()>)> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        let (tx, rx) = mpsc::channel(EVENT_LOG_QUEUE);
        let handle = tokio::spawn(write_records(BufWriter::new(file), rx));
        tracing::info!(path = %path.display(), "Event log opened");
        Ok((Self { tx }, handle))
    }

    fn push(&self, record: LogRecord) {
        if let Err(e) = self.tx.try_send(record) {
            tracing::debug!(error = %e, "Event log queue unavailable, dropping record");
        }
    }
}

impl EventSink for EventLog {
    fn record_request(&self, event: &RequestEvent) {
        self.push(LogRecord::Request {
            timestamp_ms: now_ms(),
            event: event.clone(),
        });
    }

    fn record_health(&self, event: &HealthEvent) {
        self.push(LogRecord::Health {
            timestamp_ms: now_ms(),
            event: event.clone(),
        });
    }
}

async fn write_records(mut out: BufWriter<tokio::fs::File>, mut rx: mpsc::Receiver<LogRecord>) {
    while let Some(record) = rx.recv().await {
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = out.write_all(&line).await {
            tracing::warn!(error = %e, "Failed to write event log");
            continue;
        }
        if rx.is_empty() {
            if let Err(e) = out.flush().await {
                tracing::warn!(error = %e, "Failed to flush event log");
            }
        }
    }
    if let Err(e) = out.flush().await {
        tracing::warn!(error = %e, "Failed to flush event log");
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
