use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::models::{ImageSearchResponse, SearchRequestBody, SearchResponse};
use crate::api::state::AppState;

/// `POST /api/search` -- exact tag-prefix search over Requests.
pub async fn search_requests(
    State(state): State<AppState>,
    Json(body): Json<SearchRequestBody>,
) -> Result<Json<SearchResponse>, ApiError> {
    if body.tag.trim().is_empty() {
        return Err(ApiError::Validation("tag must not be empty".to_string()));
    }
    let ids = state.store.search_by_tag(&body.tag, body.limit, body.fuzzy)?;
    let count = ids.len();
    Ok(Json(SearchResponse { ids, count }))
}

/// `POST /api/images/search` -- tag search scoped to Images.
pub async fn search_images(
    State(state): State<AppState>,
    Json(body): Json<SearchRequestBody>,
) -> Result<Json<ImageSearchResponse>, ApiError> {
    if body.tag.trim().is_empty() {
        return Err(ApiError::Validation("tag must not be empty".to_string()));
    }
    let images = state.store.search_images_by_tag(&body.tag, body.limit, body.fuzzy)?;
    let count = images.len();
    Ok(Json(ImageSearchResponse { images, count }))
}

/// `GET /api/documents/{uuid}/images` -- images owned by a Request.
pub async fn images_for_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ImageSearchResponse>, ApiError> {
    state
        .store
        .get_request(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("request {id}")))?;

    let image_ids = state.store.images_for_request(&id)?;
    let mut images = Vec::with_capacity(image_ids.len());
    for image_id in image_ids {
        if let Some(image) = state.store.get_image(&image_id)? {
            images.push(image);
        }
    }
    let count = images.len();
    Ok(Json(ImageSearchResponse { images, count }))
}
