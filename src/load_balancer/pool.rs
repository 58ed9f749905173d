//! Backend pool.
//!
//! # Responsibilities
//! - Own the ordered, fixed set of backends
//! - Provide iteration and indexed access for selection and health checking

use std::sync::Arc;

use crate::load_balancer::backend::{Backend, BackendError};

/// Ordered collection of backends. Membership never changes after construction.
#[derive(Debug, Default)]
pub struct Pool {
    backends: Vec<Arc<Backend>>,
}

impl Pool {
    /// Build a pool from configured addresses, preserving their order.
    ///
    /// The first malformed address aborts construction.
    pub fn from_addresses<I, S>(addresses: I) -> Result<Self, BackendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let backends = addresses
            .into_iter()
            .map(|addr| Backend::new(addr.as_ref()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(backends))
    }

    pub fn new(backends: Vec<Arc<Backend>>) -> Self {
        Self { backends }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Backend>> {
        self.backends.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Backend>> {
        self.backends.iter()
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Number of backends currently considered alive.
    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }
}
