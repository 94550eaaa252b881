//! Caller-facing association requests.
//!
//! [`AssociationService`] is the only sanctioned path for opening or closing
//! an association: it checks input shape, then runs the transition executor
//! inside the orchestrator.

use std::sync::Arc;

use crate::error::CoreError;
use crate::types::{Date, DbId};

use super::executor::TransitionExecutor;
use super::lock_manager::LockManager;
use super::orchestrator::{IdempotencyError, IdempotentRequest, Orchestrator, Outcome};
use super::store::ResourceStore;
use super::{check_exit_date, Association, NewAssociation, Operation, ValidationCode};

#[derive(Clone)]
pub struct AssociationService {
    store: Arc<dyn ResourceStore>,
    orchestrator: Orchestrator,
    executor: Arc<TransitionExecutor>,
}

impl AssociationService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            orchestrator: Orchestrator::new(store.clone()),
            executor: Arc::new(TransitionExecutor::new(store.clone())),
            store,
        }
    }

    pub fn with_lock_ttl(mut self, ttl_mins: i64) -> Self {
        self.orchestrator = self.orchestrator.with_lock_ttl(ttl_mins);
        self
    }

    pub fn locks(&self) -> &LockManager {
        self.orchestrator.locks()
    }

    /// Open an association, or report that the asset is already associated.
    pub async fn request_association_create(
        &self,
        input: NewAssociation,
    ) -> Result<Outcome<Association>, IdempotencyError> {
        input.check().map_err(rejected)?;

        let request = IdempotentRequest::new(input.asset_id, Operation::Create).with_context(
            serde_json::json!({
                "client_id": input.client_id,
                "association_type_id": input.association_type_id,
                "entry_date": input.entry_date,
            }),
        );

        let executor = Arc::clone(&self.executor);
        let result = self
            .orchestrator
            .execute(request, || async move { executor.execute(&input).await })
            .await;

        match result {
            // The store's active-association constraint caught a writer that
            // bypassed the lock. The intent already holds.
            Err(IdempotencyError::Execution(CoreError::Conflict(msg))) => {
                tracing::warn!(error = %msg, "Active association constraint hit during create");
                Ok(Outcome::AlreadySatisfied {
                    code: ValidationCode::AssetAlreadyAssociated,
                    message: msg,
                })
            }
            other => other,
        }
    }

    /// Close an association, or report that it has already ended.
    pub async fn request_association_end(
        &self,
        association_id: DbId,
        exit_date: Date,
    ) -> Result<Outcome<Association>, IdempotencyError> {
        let association = self
            .store
            .read_association(association_id)
            .await
            .map_err(|e| IdempotencyError::Validation(format!("VALIDATION_EXCEPTION: {e}")))?
            .ok_or_else(|| {
                IdempotencyError::Validation(format!("Association {association_id} not found"))
            })?;

        if association.is_active() {
            check_exit_date(&association, exit_date).map_err(rejected)?;
        }

        let request = IdempotentRequest::new(association.asset_id, Operation::End)
            .for_association(association_id)
            .with_context(serde_json::json!({
                "client_id": association.client_id,
                "exit_date": exit_date,
            }));

        let executor = Arc::clone(&self.executor);
        let result = self
            .orchestrator
            .execute(request, || async move {
                executor.end(association_id, exit_date).await
            })
            .await;

        match result {
            Err(IdempotencyError::Execution(CoreError::NotFound { .. })) => {
                Ok(Outcome::AlreadySatisfied {
                    code: ValidationCode::NoActiveAssociation,
                    message: format!("Association {association_id} has already ended"),
                })
            }
            other => other,
        }
    }
}

fn rejected(err: CoreError) -> IdempotencyError {
    match err {
        CoreError::Validation(msg) => IdempotencyError::Validation(msg),
        other => IdempotencyError::Validation(other.to_string()),
    }
}
