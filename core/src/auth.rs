use sha2::{Digest, Sha256};

/// Scheme prefix expected on the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Reserved subject used for unauthenticated demo bootstrapping.
///
/// Only the guest-seed flow may act on behalf of this id; it is never handed
/// out as an authenticated identity.
pub const DEMO_FALLBACK_USER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Extract the token from a raw `Authorization` header value.
///
/// Returns `None` when the header is absent, empty, uses another scheme, or
/// carries an empty token after `Bearer `.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?;
    if token.trim().is_empty() {
        return None;
    }
    Some(token)
}

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short, non-reversible token identifier for log lines.
pub fn token_fingerprint(token: &str) -> String {
    hash_token(token).chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_accepts_well_formed_header() {
        assert_eq!(extract_bearer(Some("Bearer abc.def")), Some("abc.def"));
    }

    #[test]
    fn extract_bearer_rejects_missing_or_malformed_headers() {
        for header in [
            None,
            Some(""),
            Some("Bearer"),
            Some("Bearer "),
            Some("Bearer    "),
            Some("bearer abc"),
            Some("Basic dXNlcjpwYXNz"),
            Some("Token abc"),
        ] {
            assert_eq!(extract_bearer(header), None, "header {header:?}");
        }
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = token_fingerprint("expired-token");
        assert_eq!(a.len(), 12);
        assert_eq!(a, token_fingerprint("expired-token"));
        assert_ne!(a, token_fingerprint("other-token"));
        assert!(hash_token("expired-token").starts_with(&a));
    }
}
