//! REST API handlers.
//!
//! Read-only routes go through the [`StatusPage`](crate::StatusPage)
//! facade; operator routes write incidents and samples via `StateStore`.

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use beacon_core::{RunReport, Status, epoch_millis};
use beacon_health::RunOptions;
use beacon_state::*;

use crate::ApiState;
use crate::error::ApiError;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    data: T,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Status page ────────────────────────────────────────────────

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let summary = state.page().get_status(epoch_millis()).await?;
    Ok(ApiResponse::ok(summary))
}

// ── Incidents ──────────────────────────────────────────────────

/// GET /api/v1/incidents
pub async fn list_incidents(
    State(state): State<ApiState>,
    query: Result<Query<IncidentFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = query?;
    Ok(ApiResponse::ok(state.page().list_incidents(&filter)?))
}

/// GET /api/v1/incidents/{id}
pub async fn get_incident(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(ApiResponse::ok(state.page().get_incident(&id)?))
}

/// POST /api/v1/incidents
pub async fn create_incident(
    State(state): State<ApiState>,
    payload: Result<Json<NewIncident>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = payload?;
    let incident = state.store.create_incident(&new, epoch_millis())?;
    info!(id = %incident.id, service_id = %incident.service_id, "incident opened");
    Ok((StatusCode::CREATED, ApiResponse::ok(incident)))
}

/// PATCH /api/v1/incidents/{id}
pub async fn update_incident(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<IncidentPatch>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(patch) = payload?;
    let incident = state.store.update_incident(&id, &patch, epoch_millis())?;
    if incident.resolved_at == Some(incident.updated_at) {
        info!(%id, "incident resolved");
    }
    Ok(ApiResponse::ok(incident))
}

// ── Samples ────────────────────────────────────────────────────

/// Externally reported service state.
#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub status: Status,
    /// Defaults to now.
    #[serde(default)]
    pub at: Option<u64>,
}

/// POST /api/v1/services/{id}/samples
pub async fn record_sample(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<SampleRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let sample = Sample {
        at: req.at.unwrap_or_else(epoch_millis),
        status: req.status,
    };
    state.store.record_sample(&id, sample.status, sample.at)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(sample)))
}

// ── Checks ─────────────────────────────────────────────────────

/// GET /api/v1/checks
///
/// `data` is `null` until the first run completes.
pub async fn latest_report(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.monitor.latest_report().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    /// Caps every check's timeout for this run.
    #[serde(default)]
    pub check_timeout_ms: Option<u64>,
}

/// POST /api/v1/checks/run
pub async fn run_checks(
    State(state): State<ApiState>,
    query: Result<Query<RunQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let options = RunOptions {
        check_timeout: query.check_timeout_ms.map(Duration::from_millis),
    };
    Ok(ApiResponse::ok(state.monitor.run_all(options).await))
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let report = state.monitor.latest_report().await.unwrap_or(RunReport {
        started_at: 0,
        completed_at: 0,
        results: Vec::new(),
    });

    let body = crate::prometheus::render_prometheus(&report);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::response::Response;
    use beacon_core::CheckOutcome;
    use beacon_health::{CheckDefinition, HealthMonitor};

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        store.put_service(&Service::new("api", "Public API")).unwrap();
        ApiState {
            store,
            monitor: Arc::new(HealthMonitor::default()),
        }
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn into_response<T: IntoResponse>(result: ApiResult<T>) -> Response {
        match result {
            Ok(r) => r.into_response(),
            Err(e) => e.into_response(),
        }
    }

    async fn open_incident(state: &ApiState) -> String {
        let resp = into_response(
            create_incident(
                State(state.clone()),
                Ok(Json(NewIncident::new("api", "Elevated errors", "Investigating"))),
            )
            .await,
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn status_lists_services() {
        let state = test_state();
        let resp = into_response(get_status(State(state)).await);
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["overall_status"], "operational");
        assert_eq!(body["data"]["services"][0]["id"], "api");
        assert_eq!(body["data"]["services"][0]["status"], "unknown");
        assert!(body["data"]["services"][0]["uptime_24h"].is_null());
    }

    #[tokio::test]
    async fn create_and_get_incident() {
        let state = test_state();
        let id = open_incident(&state).await;

        let resp = into_response(get_incident(State(state), Path(id.clone())).await);
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["id"], id);
        assert_eq!(body["data"]["status"], "investigating");
    }

    #[tokio::test]
    async fn get_nonexistent_incident() {
        let state = test_state();
        let resp = into_response(get_incident(State(state), Path("inc-000999".to_string())).await);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["key"], "incident_not_found");
    }

    #[tokio::test]
    async fn create_incident_validation() {
        let state = test_state();
        let resp = into_response(
            create_incident(State(state), Ok(Json(NewIncident::new("api", "", "ok")))).await,
        );
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["key"], "validation_failed");
        assert_eq!(body["error"]["errors"][0]["field"], "title");
        assert_eq!(body["error"]["errors"][0]["key"], "required");
    }

    #[tokio::test]
    async fn create_incident_for_unknown_service() {
        let state = test_state();
        let resp = into_response(
            create_incident(State(state), Ok(Json(NewIncident::new("ghost", "t", "m")))).await,
        );
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"]["key"], "service_not_found");
    }

    #[tokio::test]
    async fn resolved_incident_rejects_updates() {
        let state = test_state();
        let id = open_incident(&state).await;

        let resolve = IncidentPatch::message("Fixed").with_status(IncidentStatus::Resolved);
        let resp = into_response(
            update_incident(State(state.clone()), Path(id.clone()), Ok(Json(resolve))).await,
        );
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["updates"].as_array().unwrap().len(), 2);

        let resp = into_response(
            update_incident(State(state), Path(id), Ok(Json(IncidentPatch::message("again")))).await,
        );
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"]["key"], "incident_resolved");
    }

    #[tokio::test]
    async fn list_incidents_with_filter() {
        let state = test_state();
        open_incident(&state).await;
        open_incident(&state).await;

        let filter = IncidentFilter {
            limit: Some(1),
            ..Default::default()
        };
        let resp = into_response(list_incidents(State(state), Ok(Query(filter))).await);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_sample_updates_status() {
        let state = test_state();
        let req = SampleRequest {
            status: Status::Degraded,
            at: None,
        };
        let resp = into_response(
            record_sample(State(state.clone()), Path("api".to_string()), Ok(Json(req))).await,
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(state.store.current_status("api").unwrap(), Some(Status::Degraded));

        let req = SampleRequest {
            status: Status::Down,
            at: Some(1),
        };
        let resp = into_response(
            record_sample(State(state), Path("ghost".to_string()), Ok(Json(req))).await,
        );
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_and_read_checks() {
        let state = test_state();
        state.monitor.register_check(CheckDefinition::new("api", || async {
            Ok(CheckOutcome::healthy())
        }));

        let resp = latest_report(State(state.clone())).await.into_response();
        assert!(body_json(resp).await["data"].is_null());

        let resp = run_checks(State(state.clone()), Ok(Query(RunQuery::default())))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["overall_status"], "operational");
        assert_eq!(body["data"]["results"][0]["name"], "api");

        let resp = latest_report(State(state)).await.into_response();
        assert_eq!(body_json(resp).await["data"]["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prometheus_endpoint_returns_text() {
        let state = test_state();
        state.monitor.register_check(CheckDefinition::new("api", || async {
            Ok(CheckOutcome::unhealthy("refused"))
        }));
        state.monitor.run_all(RunOptions::default()).await;

        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("beacon_check_up{check=\"api\"} 0"));
        assert!(text.contains("beacon_overall_status 0"));
    }
}
