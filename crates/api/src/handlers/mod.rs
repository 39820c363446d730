//! Request handlers.
//!
//! Each submodule provides async handler functions for a single resource.
//! Handlers delegate to the record store, blob store, and scheduler from
//! [`crate::state::AppState`] and map errors via
//! [`crate::error::AppError`].

pub mod images;
