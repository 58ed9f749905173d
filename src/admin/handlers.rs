use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub algorithm: String,
    pub backends_total: usize,
    pub backends_alive: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendStatus {
    pub address: String,
    pub alive: bool,
    pub active_connections: i64,
    pub total_requests: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        algorithm: state.algorithm.to_string(),
        backends_total: state.pool.len(),
        backends_alive: state.pool.alive_count(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .iter()
        .map(|b| BackendStatus {
            address: b.address().to_string(),
            alive: b.is_alive(),
            active_connections: b.active_connections(),
            total_requests: b.total_requests(),
        })
        .collect();
    Json(statuses)
}
