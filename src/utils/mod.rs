// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;

use url::Url;

use crate::error::{AppError, Result};

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a `${VAR_NAME}` reference from the environment.
///
/// Values that are not wrapped in `${...}` are returned unchanged.
pub fn resolve_env_ref(value: &str) -> Result<String> {
    let Some(rest) = value.strip_prefix("${") else {
        return Ok(value.to_string());
    };
    let var_name = rest
        .strip_suffix('}')
        .ok_or_else(|| AppError::config(format!("Malformed env var reference: {value}")))?;
    std::env::var(var_name)
        .map_err(|_| AppError::config(format!("Environment variable '{var_name}' is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/manga/dr_stone").unwrap();
        assert_eq!(
            resolve_url(&base, "/chapter/dr_stone/chapter-12"),
            "https://example.com/chapter/dr_stone/chapter-12"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/chapter-1"),
            "https://other.com/chapter-1"
        );
    }

    #[test]
    fn test_resolve_env_ref_plain_value() {
        assert_eq!(resolve_env_ref("token").unwrap(), "token");
    }

    #[test]
    fn test_resolve_env_ref_missing_var() {
        let err = resolve_env_ref("${VRN_TEST_SURELY_UNSET_VAR}").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_resolve_env_ref_malformed() {
        assert!(resolve_env_ref("${NO_CLOSING").is_err());
    }
}
