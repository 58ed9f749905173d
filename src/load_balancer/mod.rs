//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives at the dispatcher
//!     → Selector::select_backend(pool, algorithm)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!         - random.rs (uniform pick among alive backends)
//!     → backend.rs (caller takes an InFlight guard)
//! ```
//!
//! # Design Decisions
//! - Selection is a pure decision; it never touches backend counters
//! - Dead backends are never returned
//! - Unknown algorithm names fall back to random

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;

pub use backend::{Backend, BackendError, InFlight};
pub use pool::Pool;

use self::least_conn::LeastConnections;
use self::random::Random;
use self::round_robin::RoundRobin;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick an alive backend, or `None` if there is none.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

/// Selection algorithm named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    LeastConn,
    Random,
}

impl Algorithm {
    /// Parse a configured name. Anything unrecognized selects [`Algorithm::Random`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "roundrobin" => Algorithm::RoundRobin,
            "leastconn" => Algorithm::LeastConn,
            _ => Algorithm::Random,
        }
    }

    /// Whether `name` maps to an algorithm explicitly rather than via the fallback.
    pub fn is_known_name(name: &str) -> bool {
        matches!(
            name.trim().to_ascii_lowercase().as_str(),
            "roundrobin" | "leastconn" | "random"
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "roundrobin",
            Algorithm::LeastConn => "leastconn",
            Algorithm::Random => "random",
        }
    }
}

impl From<String> for Algorithm {
    fn from(name: String) -> Self {
        Algorithm::from_name(&name)
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.as_str().to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the selection state for every algorithm.
///
/// The round-robin cursor lives here and is shared by all callers for the
/// lifetime of the selector.
#[derive(Debug, Default)]
pub struct Selector {
    round_robin: RoundRobin,
    least_conn: LeastConnections,
    random: Random,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an alive backend from `pool` using `algorithm`.
    pub fn select_backend(&self, pool: &Pool, algorithm: Algorithm) -> Option<Arc<Backend>> {
        self.strategy(algorithm).next_server(pool.backends())
    }

    fn strategy(&self, algorithm: Algorithm) -> &dyn LoadBalancer {
        match algorithm {
            Algorithm::RoundRobin => &self.round_robin,
            Algorithm::LeastConn => &self.least_conn,
            Algorithm::Random => &self.random,
        }
    }
}
