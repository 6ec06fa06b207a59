use axum::Json;

use crate::api::models::HealthResponse;

/// `GET /health` -- liveness only; the process replying is itself the
/// signal (matches the teacher's "if we can respond, we're healthy" note).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
