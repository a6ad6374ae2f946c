//! Principal middleware
//!
//! Credentials are verified upstream. The trusted proxy forwards the
//! authenticated principal in `x-principal-*` headers; this layer turns them
//! into a [`Principal`] request extension.

use axum::{body::Body, http::HeaderMap, http::Request, middleware::Next, response::Response};

use super::types::ApiError;
use crate::transfer::{Principal, Role};

pub const PRINCIPAL_ID: &str = "x-principal-id";
pub const PRINCIPAL_EMAIL: &str = "x-principal-email";
pub const PRINCIPAL_NAME: &str = "x-principal-name";
pub const PRINCIPAL_ROLE: &str = "x-principal-role";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let id = header(headers, PRINCIPAL_ID)?;
    Some(Principal {
        id,
        email: header(headers, PRINCIPAL_EMAIL),
        name: header(headers, PRINCIPAL_NAME),
        role: header(headers, PRINCIPAL_ROLE)
            .map(|r| Role::parse(&r))
            .unwrap_or(Role::User),
    })
}

pub async fn principal_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = principal_from_headers(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authenticated principal"))?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_principal_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(principal_from_headers(&headers).is_none());

        headers.insert(PRINCIPAL_ID, HeaderValue::from_static("alice"));
        headers.insert(PRINCIPAL_EMAIL, HeaderValue::from_static("alice@example.com"));
        let principal = principal_from_headers(&headers).unwrap();
        assert_eq!(principal.id, "alice");
        assert_eq!(principal.email.as_deref(), Some("alice@example.com"));
        assert!(!principal.is_system());

        headers.insert(PRINCIPAL_ROLE, HeaderValue::from_static("system"));
        assert!(principal_from_headers(&headers).unwrap().is_system());
    }

    #[test]
    fn test_blank_principal_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_ID, HeaderValue::from_static("   "));
        assert!(principal_from_headers(&headers).is_none());
    }
}
