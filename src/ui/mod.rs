//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task and change feed event processing
//! - `render` - Layout, header and overlays
//! - `helpers` - Background task spawning
//! - `bookmarks` - Bookmark list widget
//! - `status` - Status bar widget

mod bookmarks;
mod events;
mod helpers;
mod input;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
