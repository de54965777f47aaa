use std::fmt;

use serde::{Deserialize, Serialize};

/// Status label shown before the first session of a fresh load.
pub const STATUS_LOADING: &str = "Loading...";
/// Status label shown after the user turned the session off.
pub const STATUS_VIDEO_OFF: &str = "Video Off";
/// Status label shown after the status poller lost the backend.
pub const STATUS_DISCONNECTED: &str = "Disconnected";

/// Client-side detection session lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session; no poller may exist.
    #[default]
    Off,
    /// Start command is in flight.
    Starting,
    /// Backend confirmed the camera is running and the poller is alive.
    On,
    /// Poller failed; presented as `Off` for toggle purposes.
    Disconnected,
}

impl SessionState {
    /// `true` only while the session is fully on.
    /// `Disconnected` reports inactive so the toggle offers a restart.
    pub fn is_active(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Remote drowsiness metrics as returned by `GET /drowsiness_status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrowsinessSnapshot {
    /// Eye aspect ratio.
    pub ear: f64,
    /// Blink count since the backend session started.
    pub blink: u64,
    /// Backend status label.
    pub status: String,
    /// Drowsiness probability in `[0, 1]`.
    pub probability: f64,
    /// Backend alarm flag.
    pub alarm_on: bool,
}

impl DrowsinessSnapshot {
    /// Zeroed snapshot carrying the given status label.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            ear: 0.0,
            blink: 0,
            status: status.into(),
            probability: 0.0,
            alarm_on: false,
        }
    }

    /// Snapshot of a fresh load.
    pub fn initial() -> Self {
        Self::with_status(STATUS_LOADING)
    }

    /// Snapshot after the session was turned off.
    pub fn video_off() -> Self {
        Self::with_status(STATUS_VIDEO_OFF)
    }

    /// Snapshot after the backend was lost.
    pub fn disconnected() -> Self {
        Self::with_status(STATUS_DISCONNECTED)
    }

    /// Clamp `probability` into `[0, 1]`, mapping NaN to `0`.
    pub fn sanitized(mut self) -> Self {
        self.probability = if self.probability.is_nan() {
            0.0
        } else {
            self.probability.clamp(0.0, 1.0)
        };
        self
    }
}

impl Default for DrowsinessSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Stream attempt counter. Bumped once per session start, never decreases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamEpoch(u64);

impl StreamEpoch {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for StreamEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body action of `POST /camera_control`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraAction {
    Start,
    Stop,
}

impl CameraAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Tri-state result of a camera control command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlOutcome {
    /// 2xx response.
    Success { message: String },
    /// Non-2xx application-level response.
    Failed { message: String },
    /// The request could not complete at all.
    Error { message: String },
}

impl ControlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message } | Self::Failed { message } | Self::Error { message } => {
                message
            }
        }
    }
}

/// How a stream attempt's load race was resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The frame sink reported the first frame.
    Loaded,
    /// The frame sink reported an error.
    Errored(String),
    /// Neither signal arrived before the load timeout.
    TimedOut,
}

/// Event stream output of the session controller and stream viewport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DashboardEvent {
    /// Session lifecycle transition.
    StateChanged {
        /// New session state.
        state: SessionState,
    },
    /// Snapshot replaced (poll result or reset).
    SnapshotUpdated(DrowsinessSnapshot),
    /// User-facing backend error replaced or cleared.
    BackendErrorChanged {
        /// Current message, `None` when cleared.
        message: Option<String>,
    },
    /// A new stream attempt was opened.
    StreamStarted {
        /// Epoch of the attempt.
        epoch: StreamEpoch,
        /// Feed URL handed to the frame sink.
        url: String,
    },
    /// Viewport loading indicator changed.
    StreamLoadingChanged {
        /// Epoch of the attempt the flag belongs to.
        epoch: StreamEpoch,
        /// New loading flag.
        loading: bool,
    },
    /// Load race finished for an attempt.
    StreamResolved {
        /// Epoch of the resolved attempt.
        epoch: StreamEpoch,
        /// First signal that fired.
        outcome: StreamOutcome,
    },
}

/// Result of a user toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Session entered `On` with the given stream epoch.
    Started { epoch: StreamEpoch },
    /// Start was rejected or could not reach the backend; the session is `Off`.
    StartFailed { message: String },
    /// Session was stopped and reset.
    Stopped,
    /// Another start/stop command was still in flight.
    Ignored,
    /// The start response arrived after a teardown and was discarded.
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_status_payload() {
        let raw = r#"{"ear":0.31,"blink":2,"status":"Awake","probability":0.05,"alarm_on":false}"#;
        let snapshot: DrowsinessSnapshot =
            serde_json::from_str(raw).expect("status payload should parse");
        assert_eq!(snapshot.ear, 0.31);
        assert_eq!(snapshot.blink, 2);
        assert_eq!(snapshot.status, "Awake");
        assert!(!snapshot.alarm_on);
    }

    #[test]
    fn rejects_negative_blink_count() {
        let raw = r#"{"ear":0.3,"blink":-1,"status":"Awake","probability":0.1,"alarm_on":false}"#;
        assert!(serde_json::from_str::<DrowsinessSnapshot>(raw).is_err());
    }

    #[test]
    fn sanitize_clamps_probability() {
        let mut snapshot = DrowsinessSnapshot::with_status("Drowsy");
        snapshot.probability = 1.7;
        assert_eq!(snapshot.clone().sanitized().probability, 1.0);
        snapshot.probability = f64::NAN;
        assert_eq!(snapshot.sanitized().probability, 0.0);
    }

    #[test]
    fn camera_action_serializes_lowercase() {
        let body = serde_json::json!({ "action": CameraAction::Start });
        assert_eq!(body.to_string(), r#"{"action":"start"}"#);
    }

    #[test]
    fn control_outcome_exposes_message_for_every_variant() {
        let failed = ControlOutcome::Failed {
            message: "Camera is not streaming or already stopped.".to_owned(),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.message(), "Camera is not streaming or already stopped.");
        assert_eq!(
            ControlOutcome::Error {
                message: "timed out".to_owned()
            }
            .message(),
            "timed out"
        );
        assert!(ControlOutcome::Success {
            message: String::new()
        }
        .is_success());
    }

    #[test]
    fn only_on_is_active() {
        assert!(SessionState::On.is_active());
        assert!(!SessionState::Off.is_active());
        assert!(!SessionState::Starting.is_active());
        assert!(!SessionState::Disconnected.is_active());
    }

    #[test]
    fn epochs_step_by_one() {
        let epoch = StreamEpoch::default();
        assert_eq!(epoch.value(), 0);
        assert_eq!(epoch.next().next(), StreamEpoch::new(2));
    }
}
