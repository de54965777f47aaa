//! Client-side session orchestration for the BlinkRise monitoring dashboard.
//!
//! This crate defines the dashboard data model, the session lifecycle and
//! its controller, the status poller, the stream viewport load race, and the
//! alarm audio driver. Network and media specifics live behind the
//! [`DashboardBackend`], [`FrameSink`] and [`AlarmSink`] seams.

/// Alarm audio driver and sink contract.
pub mod alarm;
/// Remote backend contract.
pub mod backend;
/// Event channel primitives.
pub mod channel;
/// Session controller.
pub mod controller;
/// Stable error type.
pub mod error;
mod poller;
/// Session lifecycle state machine.
pub mod state_machine;
/// Dashboard data model and events.
pub mod types;
/// Stream viewport load race.
pub mod viewport;

pub use alarm::{AlarmAudioDriver, AlarmSink, AlarmSinkError};
pub use backend::DashboardBackend;
pub use channel::{DashboardChannels, EventStream, recv_event};
pub use controller::{ControllerConfig, SessionController, SessionView};
pub use error::{DashboardError, DashboardErrorKind};
pub use state_machine::SessionStateMachine;
pub use types::{
    CameraAction, ControlOutcome, DashboardEvent, DrowsinessSnapshot, STATUS_DISCONNECTED,
    STATUS_LOADING, STATUS_VIDEO_OFF, SessionState, StreamEpoch, StreamOutcome, ToggleOutcome,
};
pub use viewport::{FrameSignalSender, FrameSignals, FrameSink, StreamViewport, frame_signals};
