//! Basic auth gate for the trigger endpoints.
//!
//! Enabled by setting `STAGWELL_WEB_PASS`; the username comes from
//! `STAGWELL_WEB_USER` and falls back to "admin". With no password
//! configured the surface stays open, which suits a localhost deployment
//! behind its own firewall.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use base64::Engine;
use tracing::warn;

pub async fn basic_auth_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let expected_pass = match std::env::var("STAGWELL_WEB_PASS") {
        Ok(p) if !p.is_empty() => p,
        _ => return Ok(next.run(request).await),
    };
    let expected_user =
        std::env::var("STAGWELL_WEB_USER").unwrap_or_else(|_| "admin".to_string());

    let header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    match header.and_then(decode_basic_credentials) {
        Some((user, pass)) if user == expected_user && pass == expected_pass => {
            Ok(next.run(request).await)
        }
        Some((user, _)) => {
            warn!("Rejected basic auth attempt for '{}'", user);
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("Rejected request without a usable Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Pull the username and password out of a `Basic <base64>` header value.
/// Anything that does not decode to `user:password` is treated as absent.
fn decode_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, pass) = credentials.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_header() {
        // admin:hunter2
        let parsed = decode_basic_credentials("Basic YWRtaW46aHVudGVyMg==");
        assert_eq!(parsed, Some(("admin".into(), "hunter2".into())));
    }

    #[test]
    fn password_may_contain_colons() {
        // ops:p@ss:word
        let parsed = decode_basic_credentials("Basic b3BzOnBAc3M6d29yZA==");
        assert_eq!(parsed, Some(("ops".into(), "p@ss:word".into())));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(decode_basic_credentials("Bearer abc"), None);
        assert_eq!(decode_basic_credentials("Basic !!!"), None);
        // Decodes, but carries no user:password separator.
        assert_eq!(decode_basic_credentials("Basic YWRtaW4="), None);
    }
}
