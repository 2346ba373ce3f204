//! HTTP header filtering for the download proxy.
//!
//! A fixed deny-list is stripped from both directions; store-internal
//! metadata headers (the `x-amz-` namespace) are stripped from responses
//! before they reach the client.

use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, COOKIE, SERVER, SET_COOKIE};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Headers never forwarded in either direction.
pub const DENIED_HEADERS: [HeaderName; 4] = [COOKIE, AUTHORIZATION, SERVER, SET_COOKIE];

/// Prefix of store-internal headers stripped from responses.
pub const STORE_METADATA_PREFIX: &str = "x-amz";

/// User-metadata key carrying the original filename of an object.
pub const ORIGINAL_FILENAME_KEY: &str = "original-filename";

/// Copy request headers, dropping the deny-list. `Range` and the `If-*`
/// conditionals survive and get forwarded to the store.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if DENIED_HEADERS.contains(name) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Strip the deny-list and every store-internal metadata header in place.
pub fn filter_response_headers(headers: &mut HeaderMap) {
    for name in &DENIED_HEADERS {
        headers.remove(name);
    }
    let internal: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(STORE_METADATA_PREFIX))
        .cloned()
        .collect();
    for name in internal {
        headers.remove(&name);
    }
}

// Keep unreserved characters readable; everything else is percent-encoded.
// Spaces become %20, never '+'.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// Build an `inline` content-disposition value for the given filename.
pub fn content_disposition_inline(filename: &str) -> HeaderValue {
    let encoded = utf8_percent_encode(filename, FILENAME_ENCODE_SET).to_string();
    // Encoded output is pure ASCII, so this cannot fail.
    HeaderValue::from_str(&format!("inline; filename={}", encoded))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;

    fn sample_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, "bytes=0-99".parse().unwrap());
        headers.insert(header::COOKIE, "session=abc".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer tok".parse().unwrap());
        headers.insert(header::IF_NONE_MATCH, "\"etag\"".parse().unwrap());
        headers
    }

    #[test]
    fn request_filter_drops_deny_list_keeps_range_and_conditionals() {
        let filtered = filter_request_headers(&sample_headers());
        assert!(filtered.contains_key(header::RANGE));
        assert!(filtered.contains_key(header::IF_NONE_MATCH));
        assert!(!filtered.contains_key(header::COOKIE));
        assert!(!filtered.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn response_filter_strips_store_metadata_namespace() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        headers.insert(header::SET_COOKIE, "a=b".parse().unwrap());
        headers.insert(
            HeaderName::from_static("x-amz-meta-original-filename"),
            "a.txt".parse().unwrap(),
        );
        headers.insert(
            HeaderName::from_static("x-amz-request-id"),
            "r1".parse().unwrap(),
        );

        filter_response_headers(&mut headers);

        assert!(headers.contains_key(header::CONTENT_TYPE));
        assert!(!headers.contains_key(header::SET_COOKIE));
        assert!(!headers.keys().any(|n| n.as_str().starts_with("x-amz")));
    }

    #[test]
    fn response_filter_is_idempotent() {
        let mut headers = sample_headers();
        filter_response_headers(&mut headers);
        let once = headers.clone();
        filter_response_headers(&mut headers);
        assert_eq!(once, headers);
    }

    #[test]
    fn content_disposition_encodes_spaces_as_percent_20() {
        let value = content_disposition_inline("annual report 2024.pdf");
        assert_eq!(
            value.to_str().unwrap(),
            "inline; filename=annual%20report%202024.pdf"
        );
        assert!(!value.to_str().unwrap().contains('+'));
    }
}
