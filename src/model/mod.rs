//! Record model for bookmarks and the signed-in user.
//!
//! - [`Bookmark`] is the only entity; [`BookmarkId`] is its dedup key.
//! - [`NewBookmark`] is the validated payload for creating one from raw form input.
//! - [`User`] is the authenticated owner as reported by the auth service.

mod bookmark;
mod user;

pub use bookmark::{Bookmark, BookmarkId, NewBookmark, OwnerId, ValidationError, MAX_TITLE_LEN};
pub use user::{User, UserMetadata};
