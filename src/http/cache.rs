//! Cache headers for public listings.
//!
//! Bodies are hashed into a strong ETag; a matching `If-None-Match` gets a 304.

use crate::api_error::ApiError;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const PUBLIC_CACHE_CONTROL: &str = "public, max-age=30, stale-while-revalidate=60";

/// Strong ETag for a response body: `"<base64 sha256>"`.
pub fn body_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", STANDARD.encode(digest))
}

/// True when any entry of `If-None-Match` equals `etag`, or is `*`.
pub fn etag_matches(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|value| {
        value
            .split(',')
            .map(str::trim)
            .map(|candidate| candidate.strip_prefix("W/").unwrap_or(candidate))
            .any(|candidate| candidate == etag || candidate == "*")
    })
}

/// Serialize `value` as a cacheable 200, or 304 when the client copy is current.
pub fn cached_json<T: Serialize>(req: &HttpRequest, value: &T) -> Result<HttpResponse, ApiError> {
    let body = serde_json::to_vec(value)
        .map_err(|e| ApiError::internal_error(format!("Failed to encode response: {}", e)))?;
    let etag = body_etag(&body);

    let if_none_match = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|h| h.to_str().ok());

    let mut response = if etag_matches(if_none_match, &etag) {
        HttpResponse::NotModified().finish()
    } else {
        HttpResponse::Ok()
            .content_type("application/json")
            .body(body)
    };

    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PUBLIC_CACHE_CONTROL),
    );
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use serde_json::json;

    #[test]
    fn test_etag_is_quoted_and_stable() {
        let a = body_etag(b"{\"items\":[]}");
        let b = body_etag(b"{\"items\":[]}");
        assert_eq!(a, b);
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_ne!(a, body_etag(b"{\"items\":[1]}"));
    }

    #[test]
    fn test_etag_matching() {
        let etag = body_etag(b"x");
        assert!(etag_matches(Some(&etag), &etag));
        assert!(etag_matches(Some(&format!("\"other\", {}", etag)), &etag));
        assert!(etag_matches(Some(&format!("W/{}", etag)), &etag));
        assert!(etag_matches(Some("*"), &etag));
        assert!(!etag_matches(Some("\"other\""), &etag));
        assert!(!etag_matches(None, &etag));
    }

    #[test]
    fn test_cached_json_sets_headers() {
        let req = TestRequest::default().to_http_request();
        let resp = cached_json(&req, &json!({"items": []})).unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            PUBLIC_CACHE_CONTROL
        );
        assert!(resp.headers().contains_key(header::ETAG));
    }

    #[test]
    fn test_cached_json_not_modified() {
        let value = json!({"items": [1, 2, 3]});
        let etag = body_etag(&serde_json::to_vec(&value).unwrap());

        let req = TestRequest::default()
            .insert_header((header::IF_NONE_MATCH, etag.clone()))
            .to_http_request();
        let resp = cached_json(&req, &value).unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(resp.headers().get(header::ETAG).unwrap(), etag.as_str());
    }
}
