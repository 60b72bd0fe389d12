//! HTTP request handlers for the plan store API
//!
//! Handlers translate requests into engine calls and engine outcomes into
//! status codes and headers. Every plan operation is timed and counted.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;
use serde_json::Value;

use super::response::{ApiError, ApiResponse, JsonRequest};
use crate::core::app_state::SharedState;
use crate::engine::{OrphanReport, ReadOutcome, Stored};
use crate::system::metrics::operation;
use crate::system::{HealthStatus, ServiceStatus};
use crate::types::{Conditional, EntityKind, Principal};

/// Listing of stored plan ids
#[derive(Debug, Serialize)]
pub struct PlanList {
    /// Plan ids, sorted
    pub plans: Vec<String>,
    /// Number of plans
    pub count: usize,
}

/// Service information served on `/info`
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Service name
    pub name: String,
    /// Crate version
    pub version: String,
    /// Key-value backend in use
    pub storage_backend: String,
    /// Whether bearer tokens are required
    pub auth_enabled: bool,
    /// Supported request features
    pub capabilities: Vec<String>,
}

type HandlerResult = Result<Response, ApiError>;

fn conditional(headers: &HeaderMap, name: HeaderName) -> Option<Conditional> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(Conditional::parse)
}

fn plan_location(id: &str) -> String {
    format!("/api/v1/plans/{}", id)
}

fn stored_response(status: StatusCode, stored: Stored, location: Option<String>) -> Response {
    let etag = stored.etag.to_string();
    match location {
        Some(location) => (
            status,
            [(header::ETAG, etag), (header::LOCATION, location)],
            Json(stored.document),
        )
            .into_response(),
        None => (status, [(header::ETAG, etag)], Json(stored.document)).into_response(),
    }
}

/// POST /api/v1/plans
pub async fn create_plan(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    JsonRequest(document): JsonRequest<Value>,
) -> HandlerResult {
    let result = state
        .metrics
        .start(operation::CREATE)
        .finish(state.engine.create_plan(document, &principal).await);

    let stored = result.map_err(|e| state.reject(e))?;
    let location = plan_location(&stored.document.object_id);
    Ok(stored_response(StatusCode::CREATED, stored, Some(location)))
}

/// GET (and HEAD) /api/v1/plans/:id
pub async fn get_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> HandlerResult {
    let if_none_match = conditional(&headers, header::IF_NONE_MATCH);
    let result = state
        .metrics
        .start(operation::READ)
        .finish(state.engine.get_plan(&id, if_none_match.as_ref()).await);

    match result.map_err(|e| state.reject(e))? {
        ReadOutcome::Found(stored) => Ok(stored_response(StatusCode::OK, stored, None)),
        ReadOutcome::NotModified { etag } => {
            state.metrics.not_modified.inc();
            Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag.to_string())]).into_response())
        }
    }
}

/// PUT /api/v1/plans/:id
pub async fn replace_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    JsonRequest(document): JsonRequest<Value>,
) -> HandlerResult {
    let if_match = conditional(&headers, header::IF_MATCH);
    let result = state.metrics.start(operation::REPLACE).finish(
        state
            .engine
            .replace_plan(&id, document, if_match.as_ref(), &principal)
            .await,
    );

    let stored = result.map_err(|e| state.reject(e))?;
    Ok(stored_response(StatusCode::OK, stored, None))
}

/// PATCH /api/v1/plans/:id
pub async fn patch_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    JsonRequest(patch): JsonRequest<Value>,
) -> HandlerResult {
    let if_match = conditional(&headers, header::IF_MATCH);
    let result = state.metrics.start(operation::PATCH).finish(
        state
            .engine
            .patch_plan(&id, patch, if_match.as_ref(), &principal)
            .await,
    );

    let stored = result.map_err(|e| state.reject(e))?;
    Ok(stored_response(StatusCode::OK, stored, None))
}

/// DELETE /api/v1/plans/:id
pub async fn delete_plan(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
) -> HandlerResult {
    let if_match = conditional(&headers, header::IF_MATCH);
    let result = state.metrics.start(operation::DELETE).finish(
        state
            .engine
            .delete_plan(&id, if_match.as_ref(), &principal)
            .await,
    );

    result.map_err(|e| state.reject(e))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /api/v1/plans
pub async fn list_plans(State(state): State<SharedState>) -> HandlerResult {
    let result = state
        .metrics
        .start(operation::LIST)
        .finish(state.engine.list_plans().await);

    let plans = result.map_err(|e| state.reject(e))?;
    let count = plans.len();
    Ok(Json(ApiResponse::success(PlanList { plans, count })).into_response())
}

/// POST /api/v1/admin/orphans/collect
///
/// Warning: not coordinated with writers; children of a create or replace in
/// flight during the pass can be deleted before their plan reference lands.
pub async fn collect_orphans(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
) -> HandlerResult {
    tracing::info!(subject = %principal.subject, "Orphan collection requested");
    let result = state
        .metrics
        .start(operation::COLLECT_ORPHANS)
        .finish(state.engine.collect_orphans().await);

    let report: OrphanReport = result.map_err(|e| state.reject(e))?;
    state.metrics.record_orphans(&report);
    let message = format!("Removed {} orphaned entities", report.total());
    Ok(Json(ApiResponse::success_with_message(report, message)).into_response())
}

/// GET /health
pub async fn health_check(State(state): State<SharedState>) -> Response {
    // Any round trip through the store proves it is reachable
    let store = state.engine.store();
    let status = match store.exists(EntityKind::Plan, "health-probe").await {
        Ok(_) => ServiceStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Health probe failed");
            ServiceStatus::Unhealthy
        }
    };
    let code = match status {
        ServiceStatus::Healthy => StatusCode::OK,
        ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = HealthStatus {
        status,
        uptime_secs: state.uptime_secs(),
        storage_backend: store.backend_name().to_string(),
        version: crate::VERSION.to_string(),
    };
    (code, Json(body)).into_response()
}

/// GET /info
pub async fn system_info(State(state): State<SharedState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        storage_backend: state.engine.store().backend_name().to_string(),
        auth_enabled: state.verifier.is_some(),
        capabilities: vec![
            "conditional-writes".to_string(),
            "composite-etags".to_string(),
            "merge-patch".to_string(),
            "orphan-collection".to_string(),
        ],
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<SharedState>) -> HandlerResult {
    let body = state.metrics.render().map_err(|e| state.reject(e))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// GET /
pub async fn root_handler() -> &'static str {
    concat!(
        "planstore API\n\n",
        "Plans:\n",
        "  POST   /api/v1/plans\n",
        "  GET    /api/v1/plans\n",
        "  GET    /api/v1/plans/:id      (If-None-Match)\n",
        "  PUT    /api/v1/plans/:id      (If-Match required)\n",
        "  PATCH  /api/v1/plans/:id      (If-Match required, merge patch)\n",
        "  DELETE /api/v1/plans/:id      (If-Match required)\n\n",
        "Admin:\n",
        "  POST   /api/v1/admin/orphans/collect\n\n",
        "System:\n",
        "  GET    /health\n",
        "  GET    /info\n",
        "  GET    /metrics\n",
    )
}
