//! Utility functions for common operations.
//!
//! - **URL normalization**: canonical bookmark URLs, favicon references,
//!   display domains, and the open-in-browser guard
//! - **Text processing**: terminal-safe sanitizing and width-aware truncation
//! - **Time**: relative age labels ("5m ago")

mod text;
mod time;
mod url_normalizer;

pub use text::{display_width, sanitize_line, truncate_to_width};
pub use time::format_relative;
pub use url_normalizer::{
    display_domain, favicon_for_host, favicon_placeholder, normalize_url, validate_url_for_open,
    NormalizedUrl, UrlValidationError,
};

/// Maximum allowed search query length, enforced by the search input.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
