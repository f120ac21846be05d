use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::error::GatewayError;
use crate::http::server::AppState;

/// Guard for registry mutations.
///
/// With an empty `admin.api_key` every caller passes; otherwise the request
/// must carry `Authorization: Bearer <api_key>`.
pub struct AdminKey;

impl FromRequestParts<AppState> for AdminKey {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin.api_key.as_str();
        if expected.is_empty() {
            return Ok(AdminKey);
        }

        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => Ok(AdminKey),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "Rejected registry call without a valid admin key");
                Err(GatewayError::Unauthorized("admin key required".into()))
            }
        }
    }
}

/// Compare without an early exit on the first differing byte.
///
/// The length of the configured key is not treated as secret.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match(b"s3cret", b"s3cret"));
        assert!(!keys_match(b"s3creT", b"s3cret"));
        assert!(!keys_match(b"x3cret", b"s3cret"));
        assert!(!keys_match(b"s3cre", b"s3cret"));
        assert!(!keys_match(b"", b"s3cret"));
    }
}
