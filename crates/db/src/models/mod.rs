//! Row structs and DTOs.
//!
//! Each submodule holds a `FromRow` + `Serialize` entity struct matching the
//! database row, plus the `Deserialize` create DTO where the table accepts
//! direct inserts.

pub mod asset;
pub mod association;
pub mod client;
pub mod operation_lock;
