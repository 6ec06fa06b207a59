use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::admission::Decision;
use crate::api::error::ApiError;
use crate::api::models::{ScrapeRequestBody, ScrapeStatusResponse};
use crate::api::state::AppState;
use crate::clients::trace::RequestContext;
use crate::domain::{JobKind, Request, SourceType};

/// `POST /api/scrape` (SPEC_FULL.md §4.1, §4.4 transitions 1-3).
pub async fn submit_scrape(
    State(state): State<AppState>,
    Json(body): Json<ScrapeRequestBody>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::Validation("url must not be empty".to_string()));
    }

    let pending = state.queue.pending_count()?;
    if state.admission.is_overloaded(pending) {
        state.metrics.request_overloaded();
        return Err(ApiError::Overloaded);
    }

    let mut request = Request::new(SourceType::Url, Some(body.url.clone()), body.seo_enabled);
    request.tags = body.tags;
    let ctx = RequestContext::new(&request.id);

    let (canonical_url, decision) = state.admission.evaluate_url(&ctx, &body.url, false).await?;
    request.source_url = Some(canonical_url);

    match decision {
        Decision::Admit(score) => {
            request.metadata.link_score = Some(score);
            state.store.put_request(&request)?;
            state
                .queue
                .enqueue(request.id.clone(), JobKind::FetchAndAnalyze, serde_json::Value::Null)
                .await?;
            state.metrics.job_enqueued(JobKind::FetchAndAnalyze.as_key_str());
            info!(request_id = %request.id, "scrape request admitted");
        }
        Decision::Reject(score, tombstone) => {
            request.metadata.link_score = Some(score);
            request.metadata.below_threshold = true;
            state.store.put_request(&request)?;
            request = state.store.add_tombstone(&request.id, tombstone).await?;
            state.metrics.tombstones_created("low-score");
            info!(request_id = %request.id, "scrape request rejected below threshold");
        }
    }

    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /api/scrape-requests/{id}` -- poll async status.
pub async fn get_scrape_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScrapeStatusResponse>, ApiError> {
    let request = state
        .store
        .get_request(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("request {id}")))?;
    let pipeline_state = request.pipeline_state();
    Ok(Json(ScrapeStatusResponse {
        request,
        state: pipeline_state,
    }))
}

/// `DELETE /api/scrape-requests/{id}` -- cancel pending work (SPEC_FULL.md
/// §4.3 cancellation, §4.4 writeback policy under cancellation).
pub async fn cancel_scrape(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Request>, ApiError> {
    state
        .store
        .get_request(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("request {id}")))?;

    state.queue.cancel_pending(&id).await?;
    let request = state
        .store
        .update_request(&id, |r| r.metadata.cancelled = true)
        .await?;
    info!(request_id = %id, "scrape request cancelled");
    Ok(Json(request))
}
