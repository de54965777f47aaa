//! View-model reducer for the terminal dashboard.

use blinkrise_core::{
    DashboardEvent, DrowsinessSnapshot, SessionState, StreamEpoch, StreamOutcome,
};
use tracing::trace;

const TOGGLE_LABEL_ON: &str = "Turn Off Video";
const TOGGLE_LABEL_OFF: &str = "Turn On Video";

/// Colour hint for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Normal,
    Alarm,
}

/// Rendered metric rows, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsView {
    pub ear: String,
    pub blink_count: String,
    pub status: String,
    pub drowsy_probability: String,
    pub tone: StatusTone,
}

/// Everything the terminal renderer draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub metrics: MetricsView,
    pub error_banner: Option<String>,
    pub toggle_label: &'static str,
    pub show_spinner: bool,
    pub stream_line: String,
}

#[derive(Debug, Clone, Default)]
struct StreamState {
    epoch: Option<StreamEpoch>,
    loading: bool,
    outcome: Option<StreamOutcome>,
}

/// Mutable presenter state fed by controller events.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    session: SessionState,
    snapshot: DrowsinessSnapshot,
    backend_error: Option<String>,
    stream: StreamState,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state. Returns `true` when the view changed.
    pub fn handle_event(&mut self, event: DashboardEvent) -> bool {
        trace!(?event, "presenter event");
        match event {
            DashboardEvent::StateChanged { state } => {
                if state != SessionState::On {
                    self.stream = StreamState::default();
                }
                replace(&mut self.session, state)
            }
            DashboardEvent::SnapshotUpdated(snapshot) => replace(&mut self.snapshot, snapshot),
            DashboardEvent::BackendErrorChanged { message } => {
                replace(&mut self.backend_error, message)
            }
            DashboardEvent::StreamStarted { epoch, .. } => {
                self.stream = StreamState {
                    epoch: Some(epoch),
                    loading: false,
                    outcome: None,
                };
                true
            }
            DashboardEvent::StreamLoadingChanged { epoch, loading } => {
                if self.stream.epoch != Some(epoch) {
                    return false;
                }
                replace(&mut self.stream.loading, loading)
            }
            DashboardEvent::StreamResolved { epoch, outcome } => {
                if self.stream.epoch != Some(epoch) {
                    return false;
                }
                replace(&mut self.stream.outcome, Some(outcome))
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        let session_on = self.session.is_active();
        DashboardView {
            metrics: metrics_view(&self.snapshot),
            error_banner: self
                .backend_error
                .as_ref()
                .map(|message| format!("Error: {message}")),
            toggle_label: if session_on {
                TOGGLE_LABEL_ON
            } else {
                TOGGLE_LABEL_OFF
            },
            show_spinner: session_on && self.stream.loading && self.backend_error.is_none(),
            stream_line: self.stream_line(session_on),
        }
    }

    fn stream_line(&self, session_on: bool) -> String {
        let Some(epoch) = self.stream.epoch.filter(|_| session_on) else {
            return "Video Off".to_owned();
        };
        match (&self.stream.outcome, self.stream.loading) {
            (_, true) => format!("Stream #{epoch}: connecting..."),
            (Some(StreamOutcome::Loaded), _) => format!("Stream #{epoch}: live"),
            (Some(StreamOutcome::Errored(message)), _) => {
                format!("Stream #{epoch}: unavailable ({message})")
            }
            (Some(StreamOutcome::TimedOut), _) => {
                format!("Stream #{epoch}: no frames yet")
            }
            (None, false) => format!("Stream #{epoch}"),
        }
    }
}

pub fn metrics_view(snapshot: &DrowsinessSnapshot) -> MetricsView {
    let (status, tone) = if snapshot.alarm_on {
        (format!("{} (ALARM)", snapshot.status), StatusTone::Alarm)
    } else {
        (snapshot.status.clone(), StatusTone::Normal)
    };
    MetricsView {
        ear: format!("{:.2}", snapshot.ear),
        blink_count: snapshot.blink.to_string(),
        status,
        drowsy_probability: format!("{:.2}%", snapshot.probability * 100.0),
        tone,
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
