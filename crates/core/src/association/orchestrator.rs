//! Idempotent operation orchestration.
//!
//! ```text
//! START ──validate──▶ VALIDATED ──acquire──▶ LOCKED ──work()──▶ DONE
//!   │                    │                     │                 │
//!   ├─ idempotent ─▶ NOOP │                     ├─ idempotent ─▶ NOOP (released)
//!   └─ invalid ──▶ FAILED └─ denied ─▶ FAILED   └─ error/panic ─▶ FAILED (released)
//! ```
//!
//! The lock is released on every path out of `LOCKED`. Validation is
//! repeated once the lock is held, because another caller may have finished
//! the same transition between the first check and the grant.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;

use crate::error::CoreError;
use crate::locking::{LockErrorCode, LockScope};
use crate::types::{DbId, Timestamp};

use super::lock_manager::{LockDenied, LockManager};
use super::store::ResourceStore;
use super::validator::StateValidator;
use super::{Operation, ValidationCode, ValidationResult};

/// Successful result of an orchestrated operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The work ran and produced a value.
    Completed { data: T },
    /// The desired end state already held; nothing was written.
    AlreadySatisfied { code: ValidationCode, message: String },
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed { data } => Some(data),
            Outcome::AlreadySatisfied { .. } => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Outcome::AlreadySatisfied { .. })
    }
}

/// Failures surfaced at the orchestrator boundary.
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    /// Illegal transition or unreadable state. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Another operation holds the resource. Retry after a short delay.
    #[error("Resource {resource_id} is in use by another operation, retry shortly")]
    ResourceLocked {
        resource_id: DbId,
        expires_at: Option<Timestamp>,
    },

    /// The lock service failed. The operation did not run.
    #[error("{}: {message}", .code.as_str())]
    LockFailure { code: LockErrorCode, message: String },

    /// The work itself failed. The store's atomicity guarantees no partial write.
    #[error(transparent)]
    Execution(#[from] CoreError),
}

/// What to orchestrate.
#[derive(Debug, Clone)]
pub struct IdempotentRequest {
    pub resource_id: DbId,
    pub operation: Operation,
    pub association_id: Option<DbId>,
    pub scope: LockScope,
    /// Extra diagnostic fields merged into the lock's `operation_data`.
    pub context: serde_json::Value,
}

impl IdempotentRequest {
    pub fn new(resource_id: DbId, operation: Operation) -> Self {
        Self {
            resource_id,
            operation,
            association_id: None,
            scope: LockScope::Association,
            context: serde_json::Value::Null,
        }
    }

    pub fn for_association(mut self, association_id: DbId) -> Self {
        self.association_id = Some(association_id);
        self
    }

    pub fn with_scope(mut self, scope: LockScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    fn operation_data(&self) -> serde_json::Value {
        serde_json::json!({
            "operation": self.operation,
            "resource_id": self.resource_id,
            "association_id": self.association_id,
            "requested_at": Utc::now(),
            "context": self.context,
        })
    }
}

/// How a validation result steers the state machine.
enum Verdict {
    Proceed,
    Noop(ValidationCode, String),
    Reject(String),
}

impl From<ValidationResult> for Verdict {
    fn from(result: ValidationResult) -> Self {
        if result.valid {
            Verdict::Proceed
        } else if result.code.is_idempotent_allowed() {
            Verdict::Noop(result.code, result.message)
        } else {
            Verdict::Reject(result.message)
        }
    }
}

/// Sequences validation, lock, work, and release for one operation.
#[derive(Clone)]
pub struct Orchestrator {
    validator: Arc<StateValidator>,
    locks: LockManager,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            validator: Arc::new(StateValidator::new(store.clone())),
            locks: LockManager::new(store),
        }
    }

    /// Override the lock TTL used for orchestrated operations.
    pub fn with_lock_ttl(mut self, ttl_mins: i64) -> Self {
        self.locks = self.locks.with_default_ttl(ttl_mins);
        self
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Run `work` under validation and an exclusive lock.
    ///
    /// Returns `AlreadySatisfied` instead of running `work` when the state
    /// already matches the intent, before or after the lock is taken.
    pub async fn execute<T, F, Fut>(
        &self,
        request: IdempotentRequest,
        work: F,
    ) -> Result<Outcome<T>, IdempotencyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let IdempotentRequest {
            resource_id,
            operation,
            association_id,
            scope,
            ..
        } = request;

        // START -> VALIDATED
        match self.check(&request).await? {
            Verdict::Proceed => {}
            Verdict::Noop(code, message) => {
                tracing::debug!(
                    resource_id,
                    operation = %operation,
                    code = code.as_str(),
                    "Operation already satisfied"
                );
                return Ok(Outcome::AlreadySatisfied { code, message });
            }
            Verdict::Reject(message) => return Err(IdempotencyError::Validation(message)),
        }

        // VALIDATED -> LOCKED
        let guard = self
            .locks
            .acquire_guard(scope, resource_id, request.operation_data())
            .await
            .map_err(|denied| lock_error(resource_id, denied))?;

        // Re-check under the lock; a concurrent winner may have finished.
        let verdict = match self.check(&request).await {
            Ok(v) => v,
            Err(e) => {
                guard.release().await;
                return Err(e);
            }
        };
        match verdict {
            Verdict::Proceed => {}
            Verdict::Noop(code, message) => {
                guard.release().await;
                tracing::debug!(
                    resource_id,
                    operation = %operation,
                    code = code.as_str(),
                    "Operation satisfied by a concurrent caller"
                );
                return Ok(Outcome::AlreadySatisfied { code, message });
            }
            Verdict::Reject(message) => {
                guard.release().await;
                return Err(IdempotencyError::Validation(message));
            }
        }

        // LOCKED -> DONE | FAILED
        let result = AssertUnwindSafe(work()).catch_unwind().await;
        guard.release().await;

        match result {
            Ok(Ok(value)) => {
                tracing::info!(
                    resource_id,
                    operation = %operation,
                    ?association_id,
                    "Operation completed"
                );
                Ok(Outcome::Completed { data: value })
            }
            Ok(Err(e)) => {
                tracing::warn!(resource_id, operation = %operation, error = %e, "Operation failed");
                Err(IdempotencyError::Execution(e))
            }
            Err(panic) => {
                tracing::error!(
                    resource_id,
                    operation = %operation,
                    "Operation panicked, lock released"
                );
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn check(&self, request: &IdempotentRequest) -> Result<Verdict, IdempotencyError> {
        self.validator
            .validate(request.resource_id, request.operation, request.association_id)
            .await
            .map(Verdict::from)
            .map_err(|e| {
                tracing::error!(
                    resource_id = request.resource_id,
                    error = %e,
                    "Validation could not read state"
                );
                IdempotencyError::Validation(format!("VALIDATION_EXCEPTION: {e}"))
            })
    }
}

fn lock_error(resource_id: DbId, denied: LockDenied) -> IdempotencyError {
    match denied.code {
        LockErrorCode::ResourceLocked => IdempotencyError::ResourceLocked {
            resource_id,
            expires_at: denied.holder_expires_at,
        },
        code => IdempotencyError::LockFailure {
            code,
            message: denied.message,
        },
    }
}
