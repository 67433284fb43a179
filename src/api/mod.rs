pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::{auth::AuthService, processing::PredictionProcessor};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<PredictionProcessor>,
    pub auth: Arc<AuthService>,
    /// Require a bearer token on `/api/predict` and `/api/segments`
    pub protect_api: bool,
    /// Whole-request deadline applied by the router
    pub request_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(processor: Arc<PredictionProcessor>, auth: Arc<AuthService>) -> Self {
        Self {
            processor,
            auth,
            protect_api: false,
            request_timeout: Duration::from_secs(30),
            started_at: Instant::now(),
        }
    }

    /// Set whether the prediction API requires authentication
    pub fn with_protected_api(mut self, protect_api: bool) -> Self {
        self.protect_api = protect_api;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
