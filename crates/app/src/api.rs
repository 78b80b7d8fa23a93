use axum::{extract::State, Json};
use tracing::error;

use tms_portal_core::types::{Donation, HealthStatus, ImpactSummary};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::summary::build_impact_summary;
use crate::telemetry::record_request;

pub async fn health() -> Json<HealthStatus> {
    record_request("health", "ok");
    Json(HealthStatus::ok())
}

pub async fn impact_summary(
    State(state): State<AppState>,
) -> Result<Json<ImpactSummary>, ProblemResponse> {
    match build_impact_summary(state.storage()).await {
        Ok(summary) => {
            record_request("impact_summary", "ok");
            Ok(Json(summary))
        }
        Err(err) => {
            error!(stage = "api", endpoint = "impact_summary", error = %err, "failed to build impact summary");
            record_request("impact_summary", "error");
            Err(ProblemResponse::internal(
                "storage_unavailable",
                "failed to load impact summary",
            ))
        }
    }
}

pub async fn list_donations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Donation>>, ProblemResponse> {
    match state.storage().donations().list_recent().await {
        Ok(donations) => {
            record_request("donations", "ok");
            Ok(Json(donations))
        }
        Err(err) => {
            error!(stage = "api", endpoint = "donations", error = %err, "failed to list donations");
            record_request("donations", "error");
            Err(ProblemResponse::internal(
                "storage_unavailable",
                "failed to load donations",
            ))
        }
    }
}
