//! Client-side bookmark state.
//!
//! - [`reconcile`] - the ordered, deduplicated list merged from local actions
//!   and the change feed
//! - [`highlight`] - timed "new" markers for feed arrivals
//! - [`search`] - read-only title/URL filter over the list

pub mod highlight;
pub mod reconcile;
pub mod search;

pub use highlight::{HighlightTracker, DEFAULT_HIGHLIGHT_WINDOW};
pub use reconcile::{resolve, Applied, ReconciliationStore, Resolution};
pub use search::{filter, result_summary};
