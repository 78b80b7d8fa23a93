use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tms_portal_storage::Database;

use crate::{api, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self { metrics, storage }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }
}

/// Builds the router with the API mounted under `base_path` (empty for the root).
pub fn app_router(state: AppState, base_path: &str) -> Router {
    let api_routes = Router::new()
        .route("/health/", get(api::health))
        .route("/impact/summary/", get(api::impact_summary))
        .route("/donations/", get(api::list_donations));

    let router = if base_path.is_empty() {
        api_routes
    } else {
        Router::new().nest(base_path, api_routes)
    };

    router.route("/metrics", get(metrics)).with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
