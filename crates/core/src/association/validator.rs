//! State validation for association lifecycle steps.
//!
//! [`StateValidator`] reads the current asset and association state fresh on
//! every call and hands it to the pure `decide_*` functions, which hold the
//! actual rules.

use std::sync::Arc;

use crate::types::DbId;

use super::store::{ResourceStore, StoreError};
use super::{AssetState, Association, Operation, ValidationCode, ValidationResult, ValidationSnapshot};

/// Decides whether a CREATE or END is legal, illegal, or already satisfied.
pub struct StateValidator {
    store: Arc<dyn ResourceStore>,
}

impl StateValidator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Validate `operation` against the asset's current persisted state.
    ///
    /// `association_id` narrows an END to one specific association. Store
    /// failures are returned as errors, never folded into a result.
    pub async fn validate(
        &self,
        asset_id: DbId,
        operation: Operation,
        association_id: Option<DbId>,
    ) -> Result<ValidationResult, StoreError> {
        let asset = self.store.read_asset_status(asset_id).await?;
        let active = self.store.read_active_association(asset_id).await?;

        let result = match operation {
            Operation::Create => decide_create(asset_id, asset.as_ref(), active.as_ref()),
            Operation::End => {
                let target = match association_id {
                    Some(id) => self.store.read_association(id).await?,
                    None => None,
                };
                decide_end(
                    asset_id,
                    asset.as_ref(),
                    active.as_ref(),
                    association_id,
                    target.as_ref(),
                )
            }
        };

        tracing::debug!(
            asset_id,
            operation = %operation,
            valid = result.valid,
            code = result.code.as_str(),
            "Association state validated"
        );
        Ok(result)
    }
}

fn snapshot(asset: Option<&AssetState>, active: Option<&Association>) -> ValidationSnapshot {
    ValidationSnapshot {
        asset_status: asset.map(|a| a.status),
        active_associations: u32::from(active.is_some()),
    }
}

/// Check that the asset exists and is not soft-deleted.
fn check_asset(asset_id: DbId, asset: Option<&AssetState>) -> Result<&AssetState, String> {
    match asset {
        None => Err(format!("Asset {asset_id} not found")),
        Some(a) if a.is_deleted() => Err(format!("Asset {asset_id} has been deleted")),
        Some(a) => Ok(a),
    }
}

/// Rules for opening an association.
pub fn decide_create(
    asset_id: DbId,
    asset: Option<&AssetState>,
    active: Option<&Association>,
) -> ValidationResult {
    let snap = snapshot(asset, active);

    let asset = match check_asset(asset_id, asset) {
        Ok(a) => a,
        Err(msg) => return ValidationResult::fail(ValidationCode::ValidationError, msg, snap),
    };

    if let Some(current) = active {
        return ValidationResult::fail(
            ValidationCode::AssetAlreadyAssociated,
            format!(
                "Asset {asset_id} is already associated with client {} (association {})",
                current.client_id, current.id
            ),
            snap,
        );
    }

    if !asset.status.accepts_association() {
        return ValidationResult::fail(
            ValidationCode::ValidationError,
            format!(
                "Asset {asset_id} cannot be associated while in status {}",
                asset.status
            ),
            snap,
        );
    }

    ValidationResult::ok(snap)
}

/// Rules for closing an association.
pub fn decide_end(
    asset_id: DbId,
    asset: Option<&AssetState>,
    active: Option<&Association>,
    association_id: Option<DbId>,
    target: Option<&Association>,
) -> ValidationResult {
    let snap = snapshot(asset, active);

    if let Err(msg) = check_asset(asset_id, asset) {
        return ValidationResult::fail(ValidationCode::ValidationError, msg, snap);
    }

    if let Some(id) = association_id {
        let Some(target) = target else {
            return ValidationResult::fail(
                ValidationCode::ValidationError,
                format!("Association {id} not found"),
                snap,
            );
        };
        if target.asset_id != asset_id {
            return ValidationResult::fail(
                ValidationCode::ValidationError,
                format!(
                    "Association {id} belongs to asset {}, not asset {asset_id}",
                    target.asset_id
                ),
                snap,
            );
        }
        if !target.is_active() {
            return ValidationResult::fail(
                ValidationCode::NoActiveAssociation,
                format!("Association {id} has already ended"),
                snap,
            );
        }
    }

    match (active, association_id) {
        (None, _) => ValidationResult::fail(
            ValidationCode::NoActiveAssociation,
            format!("Asset {asset_id} has no active association"),
            snap,
        ),
        (Some(current), Some(id)) if id != current.id => ValidationResult::fail(
            ValidationCode::NoActiveAssociation,
            format!("Association {id} is not the active association of asset {asset_id}"),
            snap,
        ),
        (Some(_), _) => ValidationResult::ok(snap),
    }
}
