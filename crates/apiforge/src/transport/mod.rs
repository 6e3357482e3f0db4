//! Transport layer for apiforge.
//!
//! Serves a loaded catalog over HTTP via axum.

pub mod http;

pub use http::{AppState, ServerConfig, serve};
