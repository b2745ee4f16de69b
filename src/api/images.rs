//! Image serving endpoint
//!
//! GET /images/{id} - Serve the image generated for a conversation entry

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::AppState;

/// Entry ids restart at 1 with every session, so clients must revalidate
const CACHE_CONTROL: &str = "no-cache";

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_image))
}

/// Serve an entry's image
async fn get_image(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(image) = state.controller.entry(id).and_then(|entry| entry.image) else {
        return (StatusCode::NOT_FOUND, "Image not found").into_response();
    };

    let etag = format!("\"{}\"", image.digest());
    if etag_matches(&headers, &etag) {
        return (
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, etag), (header::CACHE_CONTROL, CACHE_CONTROL.to_string())],
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.mime_type().to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
            (header::ETAG, etag),
        ],
        image.into_bytes(),
    )
        .into_response()
}

/// Whether `If-None-Match` names the current entity tag
fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|tag| tag.trim().trim_start_matches("W/"))
        .any(|tag| tag == "*" || tag == etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_if_none_match(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_etag_matches() {
        assert!(!etag_matches(&HeaderMap::new(), "\"abc\""));
        assert!(etag_matches(&with_if_none_match("\"abc\""), "\"abc\""));
        assert!(etag_matches(&with_if_none_match("\"x\", W/\"abc\""), "\"abc\""));
        assert!(etag_matches(&with_if_none_match("*"), "\"abc\""));
        assert!(!etag_matches(&with_if_none_match("\"other\""), "\"abc\""));
    }
}
