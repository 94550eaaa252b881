//! Domain core for the asset/client association controller.
//!
//! Holds the closed status enums, the lock and validation rules, the
//! Resource Store seam, and the idempotent association orchestration built
//! on top of it. This crate has no internal dependencies; the database and
//! HTTP crates plug into [`association::store::ResourceStore`].

pub mod association;
pub mod error;
pub mod locking;
pub mod registry;
pub mod status;
pub mod types;
