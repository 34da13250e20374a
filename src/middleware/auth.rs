use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use subtle::ConstantTimeEq;

use crate::error::GmaoError;
use crate::router::GmaoState;

fn key_matches(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Ensure the inbound request carries the server key.
/// Accepts either:
/// - Header: `x-api-key: ...`
/// - Header: `Authorization: Bearer ...`
/// - Query string: `?key=...`
pub fn ensure_authorized(
    headers: &HeaderMap,
    query: Option<&str>,
    expected: &str,
) -> Result<(), GmaoError> {
    if let Some(hv) = headers.get("x-api-key").and_then(|v| v.to_str().ok())
        && key_matches(hv.trim(), expected)
    {
        return Ok(());
    }

    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let auth = auth.trim();
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            && key_matches(token.trim(), expected)
        {
            return Ok(());
        }
    }

    if let Some(qs) = query {
        for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
            if k == "key" && key_matches(&v, expected) {
                return Ok(());
            }
        }
    }

    Err(GmaoError::Unauthorized)
}

#[derive(Debug, Clone, Copy)]
pub struct RequireKeyAuth;

impl FromRequestParts<GmaoState> for RequireKeyAuth {
    type Rejection = GmaoError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GmaoState,
    ) -> Result<Self, Self::Rejection> {
        ensure_authorized(&parts.headers, parts.uri.query(), state.gmao_key())?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn accepts_each_key_location() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("s3cret"));
        assert!(ensure_authorized(&headers, None, "s3cret").is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(ensure_authorized(&headers, None, "s3cret").is_ok());

        assert!(ensure_authorized(&HeaderMap::new(), Some("a=1&key=s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn rejects_missing_or_wrong_key() {
        assert!(matches!(
            ensure_authorized(&HeaderMap::new(), None, "s3cret"),
            Err(GmaoError::Unauthorized)
        ));
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("s3cre"));
        assert!(ensure_authorized(&headers, Some("key=nope"), "s3cret").is_err());
    }
}
