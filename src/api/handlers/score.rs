use axum::extract::State;
use axum::Json;

use crate::admission::Decision;
use crate::api::error::ApiError;
use crate::api::models::{ScoreRequestBody, ScoreResponseBody};
use crate::api::state::AppState;
use crate::clients::trace::RequestContext;

/// `POST /api/score` -- scores a URL without ingesting it (SPEC_FULL.md
/// §4.1). Still consults and refreshes the fingerprint cache, so a
/// dry-run score and a subsequent real submission share one scorer call.
pub async fn score_url(
    State(state): State<AppState>,
    Json(body): Json<ScoreRequestBody>,
) -> Result<Json<ScoreResponseBody>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::Validation("url must not be empty".to_string()));
    }

    let ctx = RequestContext::new("score-dry-run");
    let (canonical_url, decision) = state.admission.evaluate_url(&ctx, &body.url, false).await?;
    let score = match decision {
        Decision::Admit(score) => score,
        Decision::Reject(score, _) => score,
    };

    Ok(Json(ScoreResponseBody { canonical_url, score }))
}
