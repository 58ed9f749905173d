//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend
//! - Update backend liveness based on results
//! - Report each probe outcome to the event sink

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{HealthProbe, ProbeError};
use crate::health::state::{self, Transition};
use crate::load_balancer::{Backend, Pool};
use crate::observability::{EventSink, HealthEvent};

pub struct HealthMonitor {
    pool: Arc<Pool>,
    probe: Arc<dyn HealthProbe>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    timeout: Duration,
    path: Arc<str>,
    /// One flag per pool slot; set while that backend's probe is running.
    probing: Arc<[AtomicBool]>,
}

impl HealthMonitor {
    pub fn new(
        pool: Arc<Pool>,
        probe: Arc<dyn HealthProbe>,
        sink: Arc<dyn EventSink>,
        config: &HealthCheckConfig,
    ) -> Self {
        let probing = (0..pool.len()).map(|_| AtomicBool::new(false)).collect();
        Self {
            pool,
            probe,
            sink,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            path: Arc::from(config.path.as_str()),
            probing,
        }
    }

    /// Override the probe period and per-probe timeout.
    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            path = %self.path,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut probes = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.spawn_round(&mut probes);
                }
                Some(joined) = probes.join_next(), if !probes.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Health probe task failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        probes.shutdown().await;
    }

    /// Run one full round and wait for every probe to finish.
    pub async fn check_round(&self) {
        let mut probes = JoinSet::new();
        self.spawn_round(&mut probes);
        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
    }

    /// Spawn one independent probe per backend, skipping backends whose
    /// previous probe is still running.
    fn spawn_round(&self, probes: &mut JoinSet<()>) {
        for (slot, backend) in self.pool.iter().enumerate() {
            if self.probing[slot].swap(true, Ordering::AcqRel) {
                tracing::debug!(backend = %backend.address(), "Previous probe still running, skipping");
                continue;
            }
            let busy = BusyFlag {
                flags: self.probing.clone(),
                slot,
            };
            let probe = self.probe.clone();
            let sink = self.sink.clone();
            let backend = backend.clone();
            let path = self.path.clone();
            let timeout = self.timeout;
            probes.spawn(async move {
                let _busy = busy;
                check_backend(probe.as_ref(), &backend, &path, timeout, sink.as_ref()).await;
            });
        }
    }
}

/// Clears a backend's probing flag when its probe task ends, however it ends.
struct BusyFlag {
    flags: Arc<[AtomicBool]>,
    slot: usize,
}

impl Drop for BusyFlag {
    fn drop(&mut self) {
        self.flags[self.slot].store(false, Ordering::Release);
    }
}

/// Probe one backend, store the verdict, and report it. Returns the verdict.
pub async fn check_backend(
    probe: &dyn HealthProbe,
    backend: &Backend,
    path: &str,
    timeout: Duration,
    sink: &dyn EventSink,
) -> bool {
    let started = Instant::now();
    let result = match time::timeout(timeout, probe.probe(backend, path)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    };
    let latency = started.elapsed();
    let healthy = result.is_ok();

    let transition = state::apply(backend, healthy);
    if let Err(e) = &result {
        if transition == Transition::Failed {
            tracing::warn!(backend = %backend.address(), error = %e, "Health check failed");
        } else {
            tracing::debug!(backend = %backend.address(), error = %e, "Health check failed");
        }
    }

    sink.record_health(&HealthEvent {
        backend: backend.address().to_string(),
        alive: healthy,
        latency_ms: latency.as_millis() as u64,
    });
    healthy
}
