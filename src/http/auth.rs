//! API key authentication against a static allow-list.

use axum::http::HeaderMap;
use std::collections::HashSet;

use super::response::ApiError;
use crate::config::AuthConfig;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Set of API keys allowed to call the rate limited routes.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    /// Create an allow-list from explicit keys.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Create the allow-list described by the auth configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            keys: config.parsed_api_keys(),
        }
    }

    /// Whether `key` is allow-listed.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Extract and validate the API key, returning the authenticated identity.
pub fn require_api_key(headers: &HeaderMap, keys: &ApiKeys) -> Result<String, ApiError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if presented.is_empty() || !keys.contains(presented) {
        return Err(ApiError::Unauthorized);
    }

    Ok(presented.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(key).unwrap());
        headers
    }

    #[test]
    fn test_rejects_invalid_key() {
        let keys = ApiKeys::new(["key-a", "key-b"]);
        let err = require_api_key(&headers("bad-key"), &keys).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_rejects_missing_key() {
        let keys = ApiKeys::new(["key-a"]);
        assert!(require_api_key(&HeaderMap::new(), &keys).is_err());
    }

    #[test]
    fn test_accepts_valid_key() {
        let keys = ApiKeys::new(["key-a", "key-b"]);
        assert_eq!(require_api_key(&headers("key-a"), &keys).unwrap(), "key-a");
    }

    #[test]
    fn test_from_config() {
        let keys = ApiKeys::from_config(&AuthConfig {
            api_keys: "alpha, beta,,".to_string(),
        });
        assert!(keys.contains("alpha"));
        assert!(keys.contains("beta"));
        assert!(!keys.contains(""));
    }
}
