//! Asset and client registration rules.
//!
//! Registration never puts an asset into a leased status; only the
//! association controller does that, paired with an association row.

use crate::error::CoreError;
use crate::status::{AssetStatus, StatusId};

// ---------------------------------------------------------------------------
// Asset kinds
// ---------------------------------------------------------------------------

pub const ASSET_KIND_CHIP: &str = "chip";
pub const ASSET_KIND_ROUTER: &str = "router";
pub const ASSET_KIND_EQUIPMENT: &str = "equipment";

/// All valid asset kinds.
pub const VALID_ASSET_KINDS: &[&str] = &[ASSET_KIND_CHIP, ASSET_KIND_ROUTER, ASSET_KIND_EQUIPMENT];

/// Maximum length of an asset identifier (ICCID, serial number).
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Maximum length of a client name.
pub const MAX_CLIENT_NAME_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

pub fn validate_asset_kind(kind: &str) -> Result<(), CoreError> {
    if VALID_ASSET_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown asset kind: '{kind}'. Valid kinds: {}",
            VALID_ASSET_KINDS.join(", ")
        )))
    }
}

pub fn validate_identifier(identifier: &str) -> Result<(), CoreError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("identifier must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::Validation(format!(
            "identifier must be at most {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    Ok(())
}

/// Resolve the initial status of a newly registered asset.
///
/// Defaults to [`AssetStatus::Available`]; leased statuses are refused.
pub fn initial_asset_status(status_id: Option<StatusId>) -> Result<AssetStatus, CoreError> {
    let status = match status_id {
        Some(id) => AssetStatus::try_from(id)?,
        None => AssetStatus::Available,
    };
    if status.is_leased() {
        return Err(CoreError::Validation(format!(
            "Asset cannot be registered as '{status}'; open an association instead"
        )));
    }
    Ok(status)
}

pub fn validate_client_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_CLIENT_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "name must be at most {MAX_CLIENT_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Shallow shape check; deliverability is not our concern.
pub fn validate_email(email: &str) -> Result<(), CoreError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(CoreError::Validation(format!("Invalid email address: '{email}'"))),
    }
}
