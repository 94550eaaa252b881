//! Advisory operation-lock constants, scopes, and validation.
//!
//! Lives in `core` so the orchestrator, the Postgres lock repository, and the
//! background sweep all agree on TTL bounds and lock scope tags.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lock duration constants
// ---------------------------------------------------------------------------

/// Default lock TTL in minutes.
pub const DEFAULT_LOCK_TTL_MINS: i64 = 5;

/// Minimum lock TTL in minutes.
pub const MIN_LOCK_TTL_MINS: i64 = 1;

/// Maximum lock TTL in minutes (1 hour).
pub const MAX_LOCK_TTL_MINS: i64 = 60;

/// How often the expired-lock sweep runs (in seconds).
pub const LOCK_SWEEP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Lock scopes
// ---------------------------------------------------------------------------

/// The operation family a lock is keyed on, together with the resource id.
///
/// CREATE and END of an association share [`LockScope::Association`] so that
/// the whole association lifecycle of one asset is mutually exclusive.
/// Other subsystems use their own scope and never contend with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockScope {
    Association,
    StatusUpdate,
}

impl LockScope {
    pub const ALL: [LockScope; 2] = [LockScope::Association, LockScope::StatusUpdate];

    /// Tag stored in `operation_locks.operation_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            LockScope::Association => "ASSOCIATION",
            LockScope::StatusUpdate => "STATUS_UPDATE",
        }
    }

    /// Parse a stored tag. Case-sensitive.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.as_str() == tag)
    }
}

impl std::fmt::Display for LockScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lock failure codes
// ---------------------------------------------------------------------------

/// Why a lock could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockErrorCode {
    /// A live lock for the same key is held by another owner.
    ResourceLocked,
    /// The lock service rejected the request (bad TTL, store refused).
    LockError,
    /// The lock service could not be reached or failed unexpectedly.
    LockException,
}

impl LockErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            LockErrorCode::ResourceLocked => "RESOURCE_LOCKED",
            LockErrorCode::LockError => "LOCK_ERROR",
            LockErrorCode::LockException => "LOCK_EXCEPTION",
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a lock TTL in minutes. Returns `Ok(())` or an error message.
pub fn validate_lock_ttl(minutes: i64) -> Result<(), String> {
    if minutes < MIN_LOCK_TTL_MINS {
        return Err(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_MINS} minute(s), got {minutes}"
        ));
    }
    if minutes > MAX_LOCK_TTL_MINS {
        return Err(format!(
            "Lock TTL must be at most {MAX_LOCK_TTL_MINS} minutes, got {minutes}"
        ));
    }
    Ok(())
}

/// Validate a lock key. Resource ids are positive database ids.
pub fn validate_lock_key(resource_id: i64) -> Result<(), String> {
    if resource_id <= 0 {
        return Err(format!("resource_id must be positive, got {resource_id}"));
    }
    Ok(())
}
