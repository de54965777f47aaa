use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SessionState;

/// Broad error kind used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DashboardErrorKind {
    /// Endpoint reachable but returned a logical failure.
    Application,
    /// Endpoint unreachable, timed out, or returned an unparsable body.
    Transport,
    /// Invalid state transition or other client-side invariant break.
    Internal,
}

/// Stable error payload shared by the controller and backend adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{kind:?}:{code}: {message}")]
pub struct DashboardError {
    /// High-level error kind.
    pub kind: DashboardErrorKind,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl DashboardError {
    pub fn new(kind: DashboardErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Non-2xx response from a reachable backend.
    pub fn http_status(status: u16, body: impl AsRef<str>) -> Self {
        Self::new(
            DashboardErrorKind::Application,
            "http_status",
            format!("HTTP error! status: {status}, message: {}", body.as_ref().trim()),
        )
    }

    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DashboardErrorKind::Transport, code, message)
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: SessionState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            DashboardErrorKind::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while session is in state {current:?}"),
        )
    }

    /// User-facing text for a failed status poll.
    pub fn poll_failure_text(&self) -> String {
        format!(
            "Could not fetch drowsiness status: {}. Is backend running?",
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_invalid_state_error_code_stable() {
        let err = DashboardError::invalid_state(SessionState::Starting, "stop");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.kind, DashboardErrorKind::Internal);
        assert!(err.message.contains("Starting"));
    }

    #[test]
    fn http_status_errors_are_application_kind() {
        let err = DashboardError::http_status(503, "camera busy\n");
        assert_eq!(err.kind, DashboardErrorKind::Application);
        assert_eq!(err.message, "HTTP error! status: 503, message: camera busy");
    }

    #[test]
    fn poll_failure_text_wraps_message() {
        let err = DashboardError::transport("connect_failed", "connection refused");
        assert_eq!(
            err.poll_failure_text(),
            "Could not fetch drowsiness status: connection refused. Is backend running?"
        );
    }
}
