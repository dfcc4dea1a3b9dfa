//! beacon-api — status page and REST API for Beacon.
//!
//! Provides the read-only [`StatusPage`] facade, axum route handlers for
//! the status page and operator actions, and Prometheus exposition of the
//! latest run.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/status` | Overall status, per-service status and uptime |
//! | GET | `/api/v1/incidents` | List incidents (`service_id`, `status`, `active_only`, `limit`) |
//! | POST | `/api/v1/incidents` | Open an incident |
//! | GET | `/api/v1/incidents/{id}` | Get an incident |
//! | PATCH | `/api/v1/incidents/{id}` | Append an update to an incident |
//! | POST | `/api/v1/services/{id}/samples` | Submit an external status sample |
//! | GET | `/api/v1/checks` | Latest run report |
//! | POST | `/api/v1/checks/run` | Run all checks now (`check_timeout_ms`) |
//! | GET | `/metrics` | Prometheus exposition |

pub mod error;
pub mod handlers;
pub mod prometheus;
pub mod status_page;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use beacon_health::HealthMonitor;
use beacon_state::StateStore;

pub use error::ApiError;
pub use prometheus::render_prometheus;
pub use status_page::{ServiceState, ServiceStatus, StatusPage, StatusSummary};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub monitor: Arc<HealthMonitor>,
}

impl ApiState {
    pub fn page(&self) -> StatusPage {
        StatusPage::new(self.store.clone(), Arc::clone(&self.monitor))
    }
}

/// Build the complete API router (REST + metrics).
pub fn build_router(store: StateStore, monitor: Arc<HealthMonitor>) -> Router {
    let api_state = ApiState { store, monitor };

    let api_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/incidents", get(handlers::list_incidents).post(handlers::create_incident))
        .route("/incidents/{id}", get(handlers::get_incident).patch(handlers::update_incident))
        .route("/services/{id}/samples", post(handlers::record_sample))
        .route("/checks", get(handlers::latest_report))
        .route("/checks/run", post(handlers::run_checks))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
