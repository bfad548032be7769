//! Credential and caller extraction from request headers.
//!
//! Verification itself happens in the runtime (constant-time, against the
//! configured allow-list); this module only reads what the caller sent.

use axum::http::HeaderMap;

use crate::tools::ExecutionRequest;

/// Extract token from an Authorization header value.
fn bearer_token(value: &str) -> Option<&str> {
    value.strip_prefix("Bearer ")
}

/// Credential presented by the caller: `x-api-key`, else a bearer token.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key")
        && let Ok(key) = value.to_str()
        && !key.is_empty()
    {
        return Some(key.to_string());
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// First hop of `x-forwarded-for`, if any.
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
}

/// Caller-supplied correlation id.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Assemble an [`ExecutionRequest`] from headers and the raw body.
pub fn execution_request(headers: &HeaderMap, body: String) -> ExecutionRequest {
    ExecutionRequest {
        body,
        credential: extract_credential(headers),
        forwarded_for: forwarded_for(headers),
        request_id: request_id(headers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parser() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("Token abc"), None);
    }

    #[test]
    fn test_extract_credential_prefers_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(extract_credential(&headers).as_deref(), Some("from-bearer"));

        headers.insert("x-api-key", HeaderValue::from_static("from-header"));
        assert_eq!(extract_credential(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.2"),
        );
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_execution_request_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-7"));
        let request = execution_request(&headers, "{}".to_string());
        assert_eq!(request.request_id.as_deref(), Some("req-7"));
        assert!(request.credential.is_none());
        assert_eq!(request.body, "{}");
    }
}
