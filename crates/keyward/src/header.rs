//! Pulling the presented key out of request headers.

use keyward_core::RawKey;

/// Designated API key header.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Alternative carrier, as `Bearer <key>`.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

const BEARER_SCHEME: &str = "bearer";

/// Pick the presented key from the designated header, or failing that a
/// `Bearer` authorization value.
///
/// Blank values count as absent. Returns `None` when neither carries a key,
/// which the validator reports as `Missing`.
pub fn extract_presented_key(api_key: Option<&str>, authorization: Option<&str>) -> Option<RawKey> {
    if let Some(value) = api_key.map(str::trim).filter(|v| !v.is_empty()) {
        return Some(RawKey::new(value));
    }

    let (scheme, token) = authorization?.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| RawKey::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(api_key: Option<&str>, authorization: Option<&str>) -> Option<String> {
        extract_presented_key(api_key, authorization).map(|k| k.expose().to_string())
    }

    #[test]
    fn test_designated_header() {
        assert_eq!(extract(Some(" ana_abc "), None).as_deref(), Some("ana_abc"));
        assert_eq!(
            extract(Some("ana_abc"), Some("Bearer cli_def")).as_deref(),
            Some("ana_abc")
        );
    }

    #[test]
    fn test_bearer_fallback() {
        assert_eq!(extract(None, Some("Bearer cli_def")).as_deref(), Some("cli_def"));
        assert_eq!(extract(Some(""), Some("bearer  cli_def")).as_deref(), Some("cli_def"));
        assert_eq!(extract(None, Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract(None, Some("Bearer")), None);
        assert_eq!(extract(None, Some("Bearer   ")), None);
    }

    #[test]
    fn test_absent() {
        assert_eq!(extract(None, None), None);
        assert_eq!(extract(Some("   "), None), None);
    }
}
