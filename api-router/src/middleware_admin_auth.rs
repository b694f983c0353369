//! Shared-secret guard for the `/admin` surface.
//!
//! The caller's token is looked up in [`TOKEN_SOURCES`] order and the first
//! non-empty value wins:
//!
//! 1. `token` query parameter
//! 2. `x-admin-token` header
//! 3. `token` field of a JSON body (the body is buffered and handed on intact)

use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{api_state::ApiState, error::ApiError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Query,
    Header,
    JsonBody,
}

pub const TOKEN_SOURCES: [TokenSource; 3] =
    [TokenSource::Query, TokenSource::Header, TokenSource::JsonBody];

#[derive(Deserialize)]
struct TokenField {
    token: Option<String>,
}

pub async fn admin_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(secret) = state.config.admin_token() else {
        return Err(ApiError::NotConfigured(
            "Admin not configured. Set ADMIN_TOKEN on the server.".to_string(),
        ));
    };

    let (token, request) = extract_admin_token(request, state.config.json_body_limit_bytes).await;

    let authorized = token.is_some_and(|token| token_matches(&token, secret));
    if !authorized {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Forbidden(
            "Forbidden: bad or missing token.".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

fn token_matches(candidate: &str, secret: &str) -> bool {
    candidate.as_bytes().ct_eq(secret.as_bytes()).into()
}

async fn extract_admin_token(mut request: Request, body_limit: usize) -> (Option<String>, Request) {
    for source in TOKEN_SOURCES {
        let token = match source {
            TokenSource::Query => token_from_query(&request),
            TokenSource::Header => token_from_header(&request),
            TokenSource::JsonBody => {
                let (token, restored) = token_from_json_body(request, body_limit).await;
                request = restored;
                token
            }
        };

        if let Some(token) = token.filter(|token| !token.is_empty()) {
            return (Some(token), request);
        }
    }

    (None, request)
}

fn token_from_query(request: &Request) -> Option<String> {
    Query::<TokenField>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(field)| field.token)
}

fn token_from_header(request: &Request) -> Option<String> {
    request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// An oversized or unreadable body yields no token; the request then carries an
/// empty body and is refused by the caller.
async fn token_from_json_body(request: Request, body_limit: usize) -> (Option<String>, Request) {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return (None, request);
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Could not buffer admin request body");
            return (None, Request::from_parts(parts, Body::empty()));
        }
    };

    let token = serde_json::from_slice::<TokenField>(&bytes)
        .ok()
        .and_then(|field| field.token);

    (token, Request::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn request(uri: &str) -> axum::http::request::Builder {
        HttpRequest::builder().method("POST").uri(uri)
    }

    #[tokio::test]
    async fn query_token_wins_over_header_and_body() {
        let req = request("/admin/create?token=from-query")
            .header(ADMIN_TOKEN_HEADER, "from-header")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"token":"from-body"}"#))
            .expect("request");

        let (token, _) = extract_admin_token(req, 1024).await;
        assert_eq!(token.as_deref(), Some("from-query"));
    }

    #[tokio::test]
    async fn header_wins_over_body() {
        let req = request("/admin/create")
            .header(ADMIN_TOKEN_HEADER, "from-header")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"token":"from-body"}"#))
            .expect("request");

        let (token, _) = extract_admin_token(req, 1024).await;
        assert_eq!(token.as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn empty_query_token_falls_through() {
        let req = request("/admin/create?token=")
            .header(ADMIN_TOKEN_HEADER, "from-header")
            .body(Body::empty())
            .expect("request");

        let (token, _) = extract_admin_token(req, 1024).await;
        assert_eq!(token.as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn json_body_token_is_read_and_body_restored() {
        let body = r#"{"token":"from-body","extra":1}"#;
        let req = request("/admin/create")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request");

        let (token, restored) = extract_admin_token(req, 1024).await;
        assert_eq!(token.as_deref(), Some("from-body"));

        let bytes = axum::body::to_bytes(restored.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(bytes, body.as_bytes());
    }

    #[tokio::test]
    async fn non_json_body_is_not_inspected() {
        let req = request("/admin/upload")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from(r#"{"token":"from-body"}"#))
            .expect("request");

        let (token, _) = extract_admin_token(req, 1024).await;
        assert_eq!(token, None);
    }

    #[tokio::test]
    async fn oversized_json_body_yields_no_token() {
        let req = request("/admin/create")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"token":"from-body","padding":"xxxxxxxxxxxxxxxx"}"#))
            .expect("request");

        let (token, _) = extract_admin_token(req, 8).await;
        assert_eq!(token, None);
    }

    #[test]
    fn token_comparison_is_exact() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret ", "s3cret"));
        assert!(!token_matches("S3CRET", "s3cret"));
        assert!(!token_matches("", "s3cret"));
    }
}
