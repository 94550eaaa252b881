//! Advisory lock grants, renewals, and release over the Resource Store.
//!
//! Lock state lives entirely in the store, so any number of processes
//! sharing one store coordinate through it. Nothing here holds an
//! in-process mutex.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::locking::{
    validate_lock_key, validate_lock_ttl, LockErrorCode, LockScope, DEFAULT_LOCK_TTL_MINS,
};
use crate::types::{DbId, Timestamp};

use super::store::{LockAttempt, LockRequest, OperationLock, ResourceStore, StoreError};

/// A lock the caller now holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockGrant {
    pub lock_id: Uuid,
    pub scope: LockScope,
    pub resource_id: DbId,
    pub owner_token: Uuid,
    pub expires_at: Timestamp,
    pub renewed: bool,
}

/// A refused lock request.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {message}", .code.as_str())]
pub struct LockDenied {
    pub code: LockErrorCode,
    pub message: String,
    /// Expiry of the competing lock when `code` is `ResourceLocked`.
    pub holder_expires_at: Option<Timestamp>,
}

impl LockDenied {
    fn new(code: LockErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            holder_expires_at: None,
        }
    }
}

/// Grants and releases `(scope, resource_id)` advisory locks.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn ResourceStore>,
    default_ttl_mins: i64,
}

impl LockManager {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            default_ttl_mins: DEFAULT_LOCK_TTL_MINS,
        }
    }

    /// Use `ttl_mins` for acquisitions that do not pass their own TTL.
    pub fn with_default_ttl(mut self, ttl_mins: i64) -> Self {
        self.default_ttl_mins = ttl_mins;
        self
    }

    pub fn default_ttl_mins(&self) -> i64 {
        self.default_ttl_mins
    }

    /// Acquire or renew the lock on `(scope, resource_id)` for `owner_token`.
    ///
    /// Fails fast with `ResourceLocked` when another owner holds a live
    /// lock; there is no waiting or queueing.
    pub async fn acquire(
        &self,
        scope: LockScope,
        resource_id: DbId,
        owner_token: Uuid,
        operation_data: serde_json::Value,
        ttl_mins: Option<i64>,
    ) -> Result<LockGrant, LockDenied> {
        let ttl_mins = ttl_mins.unwrap_or(self.default_ttl_mins);
        validate_lock_ttl(ttl_mins)
            .map_err(|msg| LockDenied::new(LockErrorCode::LockError, msg))?;
        validate_lock_key(resource_id)
            .map_err(|msg| LockDenied::new(LockErrorCode::LockError, msg))?;

        let request = LockRequest {
            scope,
            resource_id,
            owner_token,
            ttl_mins,
            operation_data,
        };

        let attempt = self.store.acquire_lock(&request).await.map_err(|e| {
            tracing::error!(error = %e, scope = %scope, resource_id, "Lock acquisition failed");
            let code = match e {
                StoreError::Backend(_) => LockErrorCode::LockException,
                StoreError::NotFound { .. } | StoreError::Conflict(_) => LockErrorCode::LockError,
            };
            LockDenied::new(code, e.to_string())
        })?;

        match attempt {
            LockAttempt::Granted { lock, renewed } => {
                if renewed {
                    tracing::debug!(
                        lock_id = %lock.lock_id,
                        scope = %scope,
                        resource_id,
                        expires_at = %lock.expires_at,
                        "Lock renewed"
                    );
                } else {
                    tracing::info!(lock_id = %lock.lock_id, scope = %scope, resource_id, "Lock acquired");
                }
                Ok(LockGrant {
                    lock_id: lock.lock_id,
                    scope,
                    resource_id,
                    owner_token,
                    expires_at: lock.expires_at,
                    renewed,
                })
            }
            LockAttempt::Held { holder } => {
                tracing::warn!(
                    scope = %scope,
                    resource_id,
                    holder_lock_id = %holder.lock_id,
                    holder_expires_at = %holder.expires_at,
                    "Lock denied, resource busy"
                );
                Err(LockDenied {
                    code: LockErrorCode::ResourceLocked,
                    message: format!(
                        "{scope} lock on resource {resource_id} is held until {}",
                        holder.expires_at
                    ),
                    holder_expires_at: Some(holder.expires_at),
                })
            }
        }
    }

    /// Acquire a lock wrapped in a [`LockGuard`].
    pub async fn acquire_guard(
        &self,
        scope: LockScope,
        resource_id: DbId,
        operation_data: serde_json::Value,
    ) -> Result<LockGuard, LockDenied> {
        let grant = self
            .acquire(scope, resource_id, Uuid::new_v4(), operation_data, None)
            .await?;
        Ok(LockGuard {
            manager: self.clone(),
            grant: Some(grant),
        })
    }

    /// Release a lock. Returns `false` for unknown or already-expired locks
    /// and for store failures, which are logged; the TTL reclaims the lock.
    pub async fn release(&self, lock_id: Uuid) -> bool {
        match self.store.release_lock(lock_id).await {
            Ok(true) => {
                tracing::info!(%lock_id, "Lock released");
                true
            }
            Ok(false) => {
                tracing::debug!(%lock_id, "Lock already gone at release");
                false
            }
            Err(e) => {
                tracing::error!(%lock_id, error = %e, "Lock release failed, TTL will reclaim it");
                false
            }
        }
    }

    /// Remove all expired locks. Returns the number removed.
    pub async fn sweep_expired(&self) -> Result<u64, StoreError> {
        self.store.sweep_expired_locks().await
    }

    /// The live lock on a key, if any.
    pub async fn current(
        &self,
        scope: LockScope,
        resource_id: DbId,
    ) -> Result<Option<OperationLock>, StoreError> {
        self.store.find_live_lock(scope, resource_id).await
    }
}

/// Scoped ownership of a granted lock.
///
/// Call [`LockGuard::release`] on every normal exit. If the guard is dropped
/// while still holding the grant (the owning future was cancelled), release
/// is handed to the runtime in the background.
pub struct LockGuard {
    manager: LockManager,
    grant: Option<LockGrant>,
}

impl LockGuard {
    pub fn grant(&self) -> Option<&LockGrant> {
        self.grant.as_ref()
    }

    pub async fn release(mut self) -> bool {
        match self.grant.take() {
            Some(grant) => self.manager.release(grant.lock_id).await,
            None => false,
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(grant) = self.grant.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = self.manager.clone();
                handle.spawn(async move {
                    manager.release(grant.lock_id).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    lock_id = %grant.lock_id,
                    "Lock guard dropped outside a runtime, leaving lock to expire"
                );
            }
        }
    }
}
