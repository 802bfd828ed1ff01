//! Caller identity extraction

use http::HeaderMap;

/// Metadata key carrying the caller identity
pub const PRINCIPAL_HEADER: &str = "x-emulator-principal";

/// Extract the caller identity from request metadata.
///
/// Blank values count as absent.
pub fn extract_principal(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_extract_principal() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_principal(&headers), None);

        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("user:admin@example.com"));
        assert_eq!(
            extract_principal(&headers).as_deref(),
            Some("user:admin@example.com")
        );

        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("   "));
        assert_eq!(extract_principal(&headers), None);
    }
}
