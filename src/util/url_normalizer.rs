use thiserror::Error;
use url::Url;

/// Favicon lookup service, keyed by hostname.
const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

/// Errors from URL normalization and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    /// The (auto-prefixed) input could not be parsed as a URL.
    #[error("Please enter a valid URL (e.g., https://google.com)")]
    InvalidUrl(String),
    /// The hostname has no `.` (bare hosts like `localhost`).
    #[error("Invalid domain format: {0}")]
    InvalidDomain(String),
    /// Only http/https URLs may be opened.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// A canonical bookmark URL plus its derived favicon reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    pub url: String,
    pub favicon_ref: Option<String>,
}

/// Convert raw user input into a canonical bookmark URL.
///
/// Trims whitespace and prepends `https://` when no http(s) scheme is
/// present. The returned string is the trimmed input itself, not the parser's
/// serialization, so casing and paths are kept exactly as typed. Normalizing
/// an already-normalized URL returns the same string.
///
/// # Errors
///
/// - [`UrlValidationError::InvalidUrl`] if the prefixed input does not parse
/// - [`UrlValidationError::InvalidDomain`] if the hostname has no `.`
///
/// # Examples
///
/// ```
/// use markvault::util::normalize_url;
///
/// assert_eq!(normalize_url("example.com").unwrap().url, "https://example.com");
/// assert_eq!(
///     normalize_url(" http://Example.com/page ").unwrap().url,
///     "http://Example.com/page"
/// );
/// assert!(normalize_url("notaurl").is_err());
/// ```
pub fn normalize_url(raw: &str) -> Result<NormalizedUrl, UrlValidationError> {
    let trimmed = raw.trim();
    let candidate = if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed =
        Url::parse(&candidate).map_err(|_| UrlValidationError::InvalidUrl(candidate.clone()))?;

    let host = match parsed.host_str() {
        Some(host) if host.contains('.') => host,
        Some(host) => return Err(UrlValidationError::InvalidDomain(host.to_string())),
        None => return Err(UrlValidationError::InvalidUrl(candidate)),
    };

    let favicon_ref = Some(favicon_for_host(host));
    Ok(NormalizedUrl {
        url: candidate,
        favicon_ref,
    })
}

/// Favicon lookup URL for a hostname. Never fails; an unreachable icon is a
/// render-time concern.
pub fn favicon_for_host(host: &str) -> String {
    format!("{}?domain={}&sz=64", FAVICON_SERVICE, host)
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Hostname shown under a bookmark title, with a leading `www.` removed.
///
/// Falls back to the raw string when it cannot be parsed.
pub fn display_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Single-glyph stand-in for a missing favicon: the domain's first letter.
pub fn favicon_placeholder(url: &str) -> char {
    display_domain(url)
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?')
}

/// Validate a stored URL before handing it to the system browser.
///
/// Only `http` and `https` are allowed so a crafted record cannot launch
/// `file://` or custom-protocol handlers.
pub fn validate_url_for_open(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url).map_err(|_| UrlValidationError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_string())),
    }
}
