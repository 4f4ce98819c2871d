//! Hostname extraction for navigation events.

/// Error type for hostname extraction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Derive the cache/queue key for a visited page.
///
/// 1. Trim whitespace, default the scheme to `https://` when absent
/// 2. Accept only `http` and `https` (browser-internal pages are rejected)
/// 3. Return the lowercased host without a trailing dot
pub fn hostname_of(input: &str) -> Result<String, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let host = parsed
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| UrlError::MissingHost(trimmed.to_string()))?;

    Ok(host)
}
