use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};

use crate::api::state::AppState;

const SITEMAP_PAGE_SIZE: usize = 5_000;

/// `GET /content/{slug}` -- the only public page the core itself renders;
/// everything else is left to the presentation surfaces named out of
/// scope in SPEC_FULL.md §1. Tombstoned and unknown slugs both 404, so a
/// tombstone's existence isn't leaked to an unauthenticated caller.
pub async fn public_content(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let request = match state.store.get_request_by_slug(&slug) {
        Ok(Some(r)) => r,
        _ => return (StatusCode::NOT_FOUND, Html("not found".to_string())),
    };
    if request.is_tombstoned(chrono::Utc::now()) {
        return (StatusCode::NOT_FOUND, Html("not found".to_string()));
    }

    let synopsis = request
        .metadata
        .analyzer_metadata
        .as_ref()
        .and_then(|m| m.synopsis.clone())
        .unwrap_or_default();
    let body = format!(
        "<!doctype html><html><head><title>{slug}</title></head><body><h1>{slug}</h1><p>{synopsis}</p></body></html>"
    );
    (StatusCode::OK, Html(body))
}

/// `GET /sitemap.xml` -- completed, SEO-enabled, non-tombstoned Requests.
pub async fn sitemap(State(state): State<AppState>) -> impl IntoResponse {
    let (requests, _) = match state.store.list_requests(SITEMAP_PAGE_SIZE, 0) {
        Ok(page) => page,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, "application/xml")], String::new()),
    };
    let now = chrono::Utc::now();

    let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for request in requests
        .iter()
        .filter(|r| r.seo_enabled && !r.is_tombstoned(now))
    {
        if let Some(slug) = &request.slug {
            body.push_str(&format!("  <url><loc>/content/{slug}</loc></url>\n"));
        }
    }
    body.push_str("</urlset>\n");

    (StatusCode::OK, [(header::CONTENT_TYPE, "application/xml")], body)
}

/// `GET /images-sitemap.xml` -- images belonging to public Requests.
pub async fn images_sitemap(State(state): State<AppState>) -> impl IntoResponse {
    let (requests, _) = match state.store.list_requests(SITEMAP_PAGE_SIZE, 0) {
        Ok(page) => page,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, "application/xml")], String::new()),
    };
    let now = chrono::Utc::now();

    let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" xmlns:image=\"http://www.google.com/schemas/sitemap-image/1.1\">\n");
    for request in requests
        .iter()
        .filter(|r| r.seo_enabled && !r.is_tombstoned(now))
    {
        let Some(slug) = &request.slug else { continue };
        let Ok(image_ids) = state.store.images_for_request(&request.id) else { continue };
        if image_ids.is_empty() {
            continue;
        }
        body.push_str(&format!("  <url><loc>/content/{slug}</loc>\n"));
        for image_id in image_ids {
            if let Ok(Some(image)) = state.store.get_image(&image_id) {
                if let Some(url) = image.url {
                    body.push_str(&format!("    <image:image><image:loc>{url}</image:loc></image:image>\n"));
                }
            }
        }
        body.push_str("  </url>\n");
    }
    body.push_str("</urlset>\n");

    (StatusCode::OK, [(header::CONTENT_TYPE, "application/xml")], body)
}

/// `GET /robots.txt`.
pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    let bind = state.config.server.bind_addr;
    let body = format!("User-agent: *\nAllow: /\nSitemap: http://{bind}/sitemap.xml\n");
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], body)
}
