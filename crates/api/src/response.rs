//! Shared response envelope types for API handlers.
//!
//! Success bodies use a `{ "data": ... }` envelope. Association transitions
//! add a `status` field so callers can tell a performed change from a no-op.

use assetlink_core::association::orchestrator::Outcome;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Envelope for association transitions.
///
/// `data` is `null` when the requested end state already held.
#[derive(Debug, Serialize)]
pub struct TransitionResponse<T: Serialize> {
    pub data: Option<T>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> TransitionResponse<T> {
    /// Build from an orchestrator outcome, naming both branches.
    pub fn from_outcome(outcome: Outcome<T>, done: &'static str, noop: &'static str) -> Self {
        match outcome {
            Outcome::Completed { data } => Self {
                data: Some(data),
                status: done,
                message: None,
            },
            Outcome::AlreadySatisfied { message, .. } => Self {
                data: None,
                status: noop,
                message: Some(message),
            },
        }
    }

    pub fn is_noop(&self) -> bool {
        self.data.is_none()
    }
}
