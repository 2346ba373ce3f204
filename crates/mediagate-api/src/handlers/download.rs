//! Download proxy.
//!
//! Forwards range and conditional headers to the store, passes the store's
//! status straight through on failure, and streams the body back with the
//! deny-list and store-internal headers removed.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use mediagate_core::headers::{
    content_disposition_inline, filter_request_headers, filter_response_headers,
    ORIGINAL_FILENAME_KEY,
};
use mediagate_storage::{GetOptions, StoredObject};

use crate::error::HttpAppError;
use crate::state::AppState;

/// `GET /api/v0/files/{key}` - proxy an object out of the store.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let filtered = filter_request_headers(&headers);
    let opts = GetOptions {
        range: header_str(&filtered, header::RANGE),
        if_match: header_str(&filtered, header::IF_MATCH),
        if_none_match: header_str(&filtered, header::IF_NONE_MATCH),
        if_modified_since: header_str(&filtered, header::IF_MODIFIED_SINCE),
        if_unmodified_since: header_str(&filtered, header::IF_UNMODIFIED_SINCE),
    };

    match state.store.get(&key, opts).await {
        Ok(object) => proxy_response(&key, object),
        Err(err) => {
            // Statused store failures pass through unchanged with an empty
            // body; anything else renders as a gateway error.
            match err.status_code() {
                Some(status) => {
                    tracing::debug!(key = %key, status = status, "Store rejected download");
                    StatusCode::from_u16(status)
                        .unwrap_or(StatusCode::BAD_GATEWAY)
                        .into_response()
                }
                None => HttpAppError::from(err).into_response(),
            }
        }
    }
}

fn proxy_response(key: &str, object: StoredObject) -> Response {
    let mut headers = HeaderMap::new();
    insert_opt(&mut headers, header::CONTENT_TYPE, &object.content_type);
    insert_opt(
        &mut headers,
        header::CONTENT_LENGTH,
        &object.content_length.map(|len| len.to_string()),
    );
    insert_opt(&mut headers, header::CONTENT_RANGE, &object.content_range);
    insert_opt(&mut headers, header::ETAG, &object.etag);
    insert_opt(&mut headers, header::LAST_MODIFIED, &object.last_modified);

    filter_response_headers(&mut headers);

    let display_name = object
        .metadata
        .get(ORIGINAL_FILENAME_KEY)
        .cloned()
        .unwrap_or_else(|| key.to_string());
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition_inline(&display_name),
    );

    let status = if object.content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    (status, headers, Body::from_stream(object.body)).into_response()
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn insert_opt(headers: &mut HeaderMap, name: header::HeaderName, value: &Option<String>) {
    if let Some(value) = value {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
}
