//! Idempotent, lock-guarded association lifecycle.
//!
//! An association links one asset to one client for a date range. Opening
//! one moves the asset into a leased status, closing it moves the asset back
//! to [`AssetStatus::RELEASED`]. Both steps run through
//! [`orchestrator::Orchestrator`], which sequences
//! validation, an advisory lock, the atomic transition, and lock release.
//!
//! Nothing here talks to a database directly; persistence is reached through
//! [`store::ResourceStore`].

pub mod executor;
pub mod lock_manager;
pub mod memory;
pub mod orchestrator;
pub mod service;
pub mod store;
pub mod validator;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{AssetStatus, AssociationType, StatusId};
use crate::types::{Date, DbId, Timestamp};

/// Maximum length of free-form association notes.
pub const MAX_NOTES_LEN: usize = 2000;

// ---------------------------------------------------------------------------
// Operations and validation codes
// ---------------------------------------------------------------------------

/// Direction of an association lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    End,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::End => "END",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome code of a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    None,
    ValidationError,
    AssetAlreadyAssociated,
    NoActiveAssociation,
}

impl ValidationCode {
    /// Codes meaning "the requested end state already holds".
    pub fn is_idempotent_allowed(self) -> bool {
        matches!(
            self,
            ValidationCode::AssetAlreadyAssociated | ValidationCode::NoActiveAssociation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationCode::None => "NONE",
            ValidationCode::ValidationError => "VALIDATION_ERROR",
            ValidationCode::AssetAlreadyAssociated => "ASSET_ALREADY_ASSOCIATED",
            ValidationCode::NoActiveAssociation => "NO_ACTIVE_ASSOCIATION",
        }
    }
}

/// State observed while validating, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationSnapshot {
    /// Asset status at validation time, `None` if the asset was not found.
    pub asset_status: Option<AssetStatus>,
    /// Number of active associations observed for the asset (0 or 1).
    pub active_associations: u32,
}

/// Transient result of [`validator::StateValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub code: ValidationCode,
    pub message: String,
    pub snapshot: ValidationSnapshot,
}

impl ValidationResult {
    pub fn ok(snapshot: ValidationSnapshot) -> Self {
        Self {
            valid: true,
            code: ValidationCode::None,
            message: String::new(),
            snapshot,
        }
    }

    pub fn fail(code: ValidationCode, message: impl Into<String>, snapshot: ValidationSnapshot) -> Self {
        Self {
            valid: false,
            code,
            message: message.into(),
            snapshot,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Current persisted state of an asset as seen by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetState {
    pub asset_id: DbId,
    pub status: AssetStatus,
    pub deleted_at: Option<Timestamp>,
}

impl AssetState {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A client/asset association row. `exit_date == None` means active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Association {
    pub id: DbId,
    pub asset_id: DbId,
    pub client_id: DbId,
    pub association_type_id: AssociationType,
    pub entry_date: Date,
    pub exit_date: Option<Date>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Association {
    pub fn is_active(&self) -> bool {
        self.exit_date.is_none()
    }
}

/// Caller input for opening an association.
///
/// `association_type_id` stays a raw id until the executor maps it, so an
/// unknown type is reported as a validation failure instead of a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAssociation {
    pub asset_id: DbId,
    pub client_id: DbId,
    pub association_type_id: StatusId,
    pub entry_date: Date,
    pub notes: Option<String>,
}

impl NewAssociation {
    /// Shape checks that need no stored state.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.asset_id <= 0 {
            return Err(CoreError::Validation(format!(
                "asset_id must be positive, got {}",
                self.asset_id
            )));
        }
        if self.client_id <= 0 {
            return Err(CoreError::Validation(format!(
                "client_id must be positive, got {}",
                self.client_id
            )));
        }
        check_notes(self.notes.as_deref())?;
        AssociationType::try_from(self.association_type_id)?;
        Ok(())
    }
}

/// Reject notes longer than [`MAX_NOTES_LEN`] characters.
pub fn check_notes(notes: Option<&str>) -> Result<(), CoreError> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_LEN => Err(CoreError::Validation(format!(
            "notes must be at most {MAX_NOTES_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// Reject an exit date that precedes the association's entry date.
pub fn check_exit_date(association: &Association, exit_date: Date) -> Result<(), CoreError> {
    if exit_date < association.entry_date {
        return Err(CoreError::Validation(format!(
            "exit_date {exit_date} is before entry_date {}",
            association.entry_date
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;

    fn new_association() -> NewAssociation {
        NewAssociation {
            asset_id: 1,
            client_id: 2,
            association_type_id: AssociationType::Rental.id(),
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            notes: None,
        }
    }

    #[test]
    fn idempotent_codes() {
        assert!(ValidationCode::AssetAlreadyAssociated.is_idempotent_allowed());
        assert!(ValidationCode::NoActiveAssociation.is_idempotent_allowed());
        assert!(!ValidationCode::ValidationError.is_idempotent_allowed());
        assert!(!ValidationCode::None.is_idempotent_allowed());
    }

    #[test]
    fn valid_input_passes_check() {
        assert!(new_association().check().is_ok());
    }

    #[test]
    fn non_positive_ids_rejected() {
        let mut input = new_association();
        input.client_id = 0;
        assert_matches!(input.check(), Err(CoreError::Validation(msg)) if msg.contains("client_id"));

        let mut input = new_association();
        input.asset_id = -1;
        assert_matches!(input.check(), Err(CoreError::Validation(msg)) if msg.contains("asset_id"));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut input = new_association();
        input.association_type_id = 7;
        assert_matches!(input.check(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn long_notes_rejected() {
        let mut input = new_association();
        input.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        assert!(input.check().is_err());
        input.notes = Some("x".repeat(MAX_NOTES_LEN));
        assert!(input.check().is_ok());
    }

    #[test]
    fn exit_before_entry_rejected() {
        let now = chrono::Utc::now();
        let association = Association {
            id: 1,
            asset_id: 1,
            client_id: 1,
            association_type_id: AssociationType::Rental,
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            exit_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        assert!(check_exit_date(&association, NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()).is_err());
        assert!(check_exit_date(&association, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).is_ok());
    }
}
