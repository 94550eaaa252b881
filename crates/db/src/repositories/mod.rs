//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod asset_repo;
pub mod association_repo;
pub mod client_repo;
pub mod operation_lock_repo;

pub use asset_repo::AssetRepo;
pub use association_repo::AssociationRepo;
pub use client_repo::ClientRepo;
pub use operation_lock_repo::OperationLockRepo;

/// Default page size for list queries.
pub const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for list queries.
pub const MAX_LIMIT: i64 = 100;

/// Clamp caller-supplied paging to sane bounds.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset.unwrap_or(0).max(0),
    )
}
