use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::models::{ListQuery, RequestListResponse, TombstoneRequestBody};
use crate::api::state::AppState;
use crate::domain::{Request, Tombstone, TombstoneReason};

/// `GET /api/requests/{id}` -- administrative get-by-id; includes
/// tombstoned Requests (SPEC_FULL.md §4.5: admin surfaces always include them).
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Request>, ApiError> {
    let request = state
        .store
        .get_request(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("request {id}")))?;
    Ok(Json(request))
}

/// `GET /api/requests` -- paginated listing, administrative surface (not
/// filtered by tombstone status; see `handlers::seo` for public listings).
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let (requests, total) = state.store.list_requests(query.limit, query.offset)?;
    Ok(Json(RequestListResponse { requests, total }))
}

/// `PUT /api/requests/{id}/tombstone` -- manual suppression by an operator
/// (SPEC_FULL.md §4.5).
pub async fn tombstone_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TombstoneRequestBody>,
) -> Result<Json<Request>, ApiError> {
    state
        .store
        .get_request(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("request {id}")))?;

    let mut tombstone = Tombstone::new(TombstoneReason::Manual, state.config.tombstones.duration_for(TombstoneReason::Manual));
    if let Some(operator) = body.operator {
        tombstone = tombstone.with_operator(operator);
    }
    let request = state.store.add_tombstone(&id, tombstone).await?;
    state.metrics.tombstones_created("manual");
    info!(request_id = %id, "manual tombstone recorded");
    Ok(Json(request))
}
