//! campusfix: client core for campus issue reporting.
//!
//! Re-exports modules needed by the `campusfix` binary and integration tests in `tests/`.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod notification;
pub mod push;
pub mod report;
pub mod store;
