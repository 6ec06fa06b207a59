use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::models::AnalyzeRequestBody;
use crate::api::state::AppState;
use crate::clients::trace::RequestContext;
use crate::domain::{JobKind, Request, SourceType};

/// `POST /api/analyze` -- runs analysis inline and returns the completed
/// (or failed) Request in the same response (SPEC_FULL.md §4.1).
pub async fn submit_analyze_sync(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequestBody>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }

    let mut request = Request::new(SourceType::Text, None, body.seo_enabled);
    request.tags = body.tags;
    request.metadata.text = Some(body.text);
    state.store.put_request(&request)?;

    let ctx = RequestContext::new(&request.id);
    if let Err(err) = state.orchestrator.run_analyze_only(&ctx, &request.id).await {
        state
            .store
            .update_request(&request.id, |r| r.metadata.last_error = Some(err.to_string()))
            .await?;
        return Err(ApiError::Upstream(err.to_string()));
    }

    let request = state
        .store
        .get_request(&request.id)?
        .ok_or_else(|| ApiError::Internal("request vanished after synchronous analysis".to_string()))?;
    info!(request_id = %request.id, "synchronous analysis complete");
    Ok((StatusCode::CREATED, Json(request)))
}

/// `POST /api/analyze-requests` -- enqueues an `analyze-only` job and
/// returns immediately with the Request in its initial state.
pub async fn submit_analyze_async(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequestBody>,
) -> Result<Json<Request>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }

    let pending = state.queue.pending_count()?;
    if state.admission.is_overloaded(pending) {
        state.metrics.request_overloaded();
        return Err(ApiError::Overloaded);
    }

    let mut request = Request::new(SourceType::Text, None, body.seo_enabled);
    request.tags = body.tags;
    request.metadata.text = Some(body.text);
    state.store.put_request(&request)?;

    state
        .queue
        .enqueue(request.id.clone(), JobKind::AnalyzeOnly, serde_json::Value::Null)
        .await?;
    state.metrics.job_enqueued(JobKind::AnalyzeOnly.as_key_str());
    info!(request_id = %request.id, "async analyze request queued");

    Ok(Json(request))
}
