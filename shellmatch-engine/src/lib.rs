//! shellmatch-engine library interface
//!
//! Matches customer accounts to parent accounts in an authorized shell
//! universe. Exposes the pipeline pieces for integration testing and the
//! HTTP router used by the binary.

pub mod api;
pub mod assessment;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod services;

pub use crate::error::{ApiError, ApiResult, MatchError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shellmatch_common::events::EventBus;

use crate::config::BatchConfig;
use crate::orchestrator::{JobHandle, MatchOrchestrator};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Batch pipeline with its directory and assessment collaborators
    pub orchestrator: MatchOrchestrator,
    /// Service-wide batch defaults; requests may override per job
    pub batch_config: BatchConfig,
    /// Jobs currently running, for progress queries and cancellation
    pub jobs: Arc<RwLock<HashMap<Uuid, JobHandle>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: MatchOrchestrator, event_bus: EventBus, batch_config: BatchConfig) -> Self {
        Self {
            event_bus,
            orchestrator,
            batch_config,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::matching_routes())
        .route("/events", get(api::match_event_stream))
        .merge(api::health_routes())
        .with_state(state)
}
