//! URL canonicalization for consistent cache keys and classification.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for faro_core::Error {
    fn from(err: UrlError) -> Self {
        faro_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string against the worker's origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/css/style.css`) against `base`
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// Any scheme is accepted; the worker decides what to do with non-HTTP ones.
pub fn canonicalize(base: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if let Some(host) = parsed.host_str()
        && host.chars().any(|c| c.is_ascii_uppercase())
    {
        let lower = host.to_lowercase();
        parsed
            .set_host(Some(&lower))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Like [`canonicalize`], but only http and https are accepted.
///
/// Used for anything that will be stored: manifest entries and on-demand
/// cache requests.
pub fn canonicalize_http(base: &Url, input: &str) -> Result<Url, UrlError> {
    let url = canonicalize(base, input)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
