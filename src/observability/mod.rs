//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher / HealthMonitor
//!     → events.rs (RequestEvent, HealthEvent → EventSink)
//!         → metrics.rs (MetricsSink: counters, gauges, histograms)
//!         → events.rs (EventLog: JSON lines on disk)
//!     → logging.rs (tracing subscriber for structured logs)
//! ```
//!
//! # Design Decisions
//! - Reporting is fire-and-forget; it can never fail a request
//! - Request ID flows through the dispatcher's log fields

pub mod events;
pub mod logging;
pub mod metrics;

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;

pub use events::{EventLog, EventSink, Fanout, HealthEvent, NoopSink, RequestEvent};
pub use metrics::MetricsSink;

use crate::config::ObservabilityConfig;

/// Build the sink stack described by the observability config.
///
/// Also returns the event log's writer task, if one was started. It finishes
/// once every handle to the sink has been dropped and the queue is flushed.
///
/// Must be called from within a Tokio runtime when an event log is configured.
pub async fn build_sink(
    config: &ObservabilityConfig,
) -> std::io::Result<(Arc<dyn EventSink>, Option<JoinHandle<()>>)> {
    let mut fanout = Fanout::new().with(Arc::new(MetricsSink));
    let mut writer = None;
    if let Some(path) = &config.event_log {
        let (log, handle) = EventLog::open(Path::new(path)).await?;
        fanout = fanout.with(Arc::new(log));
        writer = Some(handle);
    }
    Ok((Arc::new(fanout), writer))
}
