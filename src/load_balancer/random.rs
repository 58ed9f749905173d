//! Random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Uniform random selector.
///
/// Draws indices without replacement (a lazy Fisher-Yates shuffle), so a
/// dead draw is resampled among the remaining backends and the search ends
/// after at most `len` draws.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let mut rng = rand::thread_rng();
        let mut order: Vec<usize> = (0..len).collect();
        for i in 0..len {
            let j = rng.gen_range(i..len);
            order.swap(i, j);
            let candidate = &backends[order[i]];
            if candidate.is_alive() {
                return Some(candidate.clone());
            }
        }
        None
    }
}
