//! markvault: a terminal bookmark manager that stays in sync with every
//! other session of the same account.
//!
//! - [`store`] reconciles optimistic local edits with remote change events
//! - [`sync`] owns the per-owner change feed subscription
//! - [`backend`] talks to the hosted auth and record services
//! - [`ui`] is the ratatui front end

pub mod app;
pub mod backend;
pub mod config;
pub mod model;
pub mod store;
pub mod sync;
pub mod theme;
pub mod ui;
pub mod util;
