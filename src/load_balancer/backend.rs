//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track liveness (written by the health monitor only)
//! - Track in-flight and total request counts
//! - Pair every dispatch with exactly one completion via [`InFlight`]

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use url::{Position, Url};

/// Reasons a configured backend address is rejected.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{scheme}' in backend address '{address}' (only http is supported)")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("backend address '{address}' has no host")]
    MissingHost { address: String },
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// The address as configured.
    address: String,
    /// Parsed base URL requests are forwarded to.
    url: Url,
    /// Last known liveness. Optimistically true until the first probe says otherwise.
    alive: AtomicBool,
    /// Requests dispatched to this backend that have not completed yet.
    active_connections: AtomicI64,
    /// Total number of dispatches, never decremented.
    requests: AtomicU64,
}

impl Backend {
    /// Create a backend from an address such as `http://10.0.0.1:9000` or `10.0.0.1:9000`.
    pub fn new(address: &str) -> Result<Self, BackendError> {
        let url = parse_backend_url(address)?;
        Ok(Self {
            address: address.to_string(),
            url,
            alive: AtomicBool::new(true),
            active_connections: AtomicI64::new(0),
            requests: AtomicU64::new(0),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host[:port]` of the backend.
    pub fn authority(&self) -> &str {
        &self.url[Position::BeforeHost..Position::AfterPort]
    }

    /// Absolute URI for `path_and_query` on this backend, joined under the base path.
    pub fn endpoint(&self, path_and_query: &str) -> String {
        let base = self.url.path().trim_end_matches('/');
        let tail = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{}", path_and_query)
        };
        format!("{}://{}{}{}", self.url.scheme(), self.authority(), base, tail)
    }

    // --- Liveness ---

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Store a new liveness value and return the previous one.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    // --- Counters ---

    /// Get the current number of in-flight requests.
    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Get the total number of requests dispatched here.
    pub fn total_requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Account for a request being dispatched to this backend.
    pub fn record_start(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for a dispatched request completing. Must follow exactly one `record_start`.
    pub fn record_end(&self) {
        let prev = self.active_connections.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "record_end without matching record_start");
    }

    /// Record a dispatch and return a guard that records its completion on drop.
    ///
    /// The guard runs on every exit path, including early returns, panics and
    /// cancellation of the owning future.
    pub fn start(self: &Arc<Self>) -> InFlight {
        self.record_start();
        InFlight {
            backend: Arc::clone(self),
        }
    }
}

/// Normalize and validate a configured backend address.
pub fn parse_backend_url(address: &str) -> Result<Url, BackendError> {
    let trimmed = address.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|source| BackendError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;

    if url.scheme() != "http" {
        return Err(BackendError::UnsupportedScheme {
            address: address.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(BackendError::MissingHost {
            address: address.to_string(),
        });
    }
    Ok(url)
}

/// A RAII guard for one in-flight request on a backend.
#[derive(Debug)]
pub struct InFlight {
    backend: Arc<Backend>,
}

impl InFlight {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for InFlight {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.backend.record_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_addresses_with_and_without_scheme() {
        let b = Backend::new("http://localhost:9000").unwrap();
        assert_eq!(b.authority(), "localhost:9000");

        let b = Backend::new("127.0.0.1:9001").unwrap();
        assert_eq!(b.url().scheme(), "http");
        assert_eq!(b.authority(), "127.0.0.1:9001");
        assert_eq!(b.address(), "127.0.0.1:9001");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            Backend::new("http://"),
            Err(BackendError::InvalidAddress { .. })
        ));
        assert!(matches!(
            Backend::new("https://example.com"),
            Err(BackendError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            Backend::new("http://[::1"),
            Err(BackendError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn endpoint_joins_base_path() {
        let b = Backend::new("http://localhost:9000").unwrap();
        assert_eq!(b.endpoint("/health"), "http://localhost:9000/health");
        assert_eq!(b.endpoint("/a?b=1"), "http://localhost:9000/a?b=1");

        let b = Backend::new("http://localhost:9000/api/").unwrap();
        assert_eq!(b.endpoint("/users"), "http://localhost:9000/api/users");
    }

    #[test]
    fn starts_alive_and_swaps_state() {
        let b = Backend::new("localhost:9000").unwrap();
        assert!(b.is_alive());
        assert!(b.set_alive(false));
        assert!(!b.is_alive());
        assert!(!b.set_alive(true));
        assert!(b.is_alive());
    }

    #[test]
    fn guard_pairs_start_and_end() {
        let b = Arc::new(Backend::new("localhost:9000").unwrap());

        let g1 = b.start();
        let g2 = b.start();
        assert_eq!(b.active_connections(), 2);
        assert_eq!(b.total_requests(), 2);

        drop(g1);
        assert_eq!(b.active_connections(), 1);
        drop(g2);
        assert_eq!(b.active_connections(), 0);
        assert_eq!(b.total_requests(), 2);
    }

    #[test]
    fn guard_releases_on_panic() {
        let b = Arc::new(Backend::new("localhost:9000").unwrap());
        let b2 = b.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = b2.start();
            panic!("forward blew up");
        });
        assert!(result.is_err());
        assert_eq!(b.active_connections(), 0);
        assert_eq!(b.total_requests(), 1);
    }

    #[test]
    fn concurrent_counters_balance() {
        let b = Arc::new(Backend::new("localhost:9000").unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let b = b.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let guard = b.start();
                        assert!(guard.active_connections() >= 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(b.active_connections(), 0);
        assert_eq!(b.total_requests(), 8000);
    }
}
