//! Assetlink API server library.
//!
//! Exposes config, state, error handling, and routes so integration tests
//! and the binary entrypoint build the same application.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
