// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-daemon
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The pipeline orchestrator ([`pipeline::Pipeline`]) plus a thin Axum front
//! door: `/healthz`, `/metrics`, and `/.well-known/agent-card.json`. Neither
//! the HTTP layer nor `solver-cli` embeds pipeline logic of its own — both
//! call into [`Pipeline::execute_raw_intent`].

/// The discovery document served at `/.well-known/agent-card.json`.
pub mod agent_card;
/// The intent-to-receipt orchestration pipeline.
pub mod pipeline;

pub use agent_card::AgentCard;
pub use pipeline::{Pipeline, PipelineOutcome};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use solver_error::SolverError;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for every route handler.
#[derive(Clone)]
pub struct AppState {
    /// The bound orchestration pipeline.
    pub pipeline: Arc<Pipeline>,
    /// The process-wide metrics registry.
    pub metrics: Arc<solver_telemetry::Metrics>,
    /// The precomputed discovery document.
    pub agent_card: Arc<AgentCard>,
}

/// Build the Axum router with all daemon routes.
#[must_use]
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/execute", post(execute))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
}

async fn agent_card(State(state): State<AppState>) -> impl IntoResponse {
    Json((*state.agent_card).clone())
}

/// The error body returned by `/execute`, mirroring [`SolverError`]'s wire shape.
#[derive(Debug, Serialize)]
struct ExecuteError {
    #[serde(flatten)]
    error: SolverError,
}

impl IntoResponse for ExecuteErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.error.code.category() {
            solver_error::ErrorCategory::Validation | solver_error::ErrorCategory::Policy => StatusCode::UNPROCESSABLE_ENTITY,
            solver_error::ErrorCategory::Execution => StatusCode::OK,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ExecuteError { error: self.error })).into_response()
    }
}

struct ExecuteErrorResponse {
    error: SolverError,
}

async fn execute(
    State(state): State<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ExecuteErrorResponse> {
    let outcome = state
        .pipeline
        .execute_raw_intent(&raw)
        .map_err(|error| ExecuteErrorResponse { error })?;

    Ok(Json(match outcome {
        PipelineOutcome::Refused(record) => json!({ "outcome": "REFUSED", "refusal": record }),
        PipelineOutcome::Completed { receipt, status } => {
            json!({ "outcome": "COMPLETED", "status": status, "receipt": receipt })
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_config::SolverConfig;
    use solver_core::{FixedClock, JobType, SolverIdentity};
    use solver_jobs::JobRegistry;
    use solver_policy::PolicyConfig;
    use tempfile::TempDir;

    fn test_state(data_dir: &std::path::Path) -> AppState {
        let config = SolverConfig {
            data_dir: data_dir.to_path_buf(),
            job_type_allowlist: vec!["SAFE_REPORT".to_string()],
            max_artifact_mb: 5,
            requester_allowlist: None,
            receipts_path: data_dir.join("receipts.jsonl"),
            refusals_path: data_dir.join("refusals.jsonl"),
            evidence_dir: data_dir.join("runs"),
        };
        let identity = SolverIdentity {
            service: "solver-daemon-test".to_string(),
            service_version: "0.1.0".to_string(),
            git_commit: None,
        };
        let metrics = Arc::new(solver_telemetry::Metrics::new());
        let pipeline = Arc::new(Pipeline::new(
            config,
            PolicyConfig {
                job_type_allowlist: vec![JobType::SafeReport],
                max_artifact_mb: 5,
                requester_allowlist: None,
            },
            JobRegistry::with_reference_runners(),
            identity.clone(),
            None,
            Box::new(FixedClock("2026-01-01T00:00:00Z".parse().unwrap())),
            metrics.clone(),
        ));
        AppState {
            pipeline,
            metrics,
            agent_card: Arc::new(AgentCard::new(&identity)),
        }
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let dir = TempDir::new().unwrap();
        let app = build_app(test_state(dir.path()));
        let response = tower::ServiceExt::oneshot(
            app,
            axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_card_route_serves_the_discovery_document() {
        let dir = TempDir::new().unwrap();
        let app = build_app(test_state(dir.path()));
        let response = tower::ServiceExt::oneshot(
            app,
            axum::http::Request::builder()
                .uri("/.well-known/agent-card.json")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_route_serves_prometheus_text() {
        let dir = TempDir::new().unwrap();
        let app = build_app(test_state(dir.path()));
        let response = tower::ServiceExt::oneshot(
            app,
            axum::http::Request::builder().uri("/metrics").body(axum::body::Body::empty()).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn execute_route_accepts_a_valid_intent() {
        let dir = TempDir::new().unwrap();
        let app = build_app(test_state(dir.path()));
        let body = serde_json::json!({
            "intentVersion": "0.1.0",
            "requester": "alice",
            "createdAt": "2026-01-01T00:00:00.000Z",
            "jobType": "SAFE_REPORT",
            "inputs": {"subject": "Hi", "data": {}}
        });
        let response = tower::ServiceExt::oneshot(
            app,
            axum::http::Request::builder()
                .method("POST")
                .uri("/execute")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
