//! Alarm audio driver derived from `DrowsinessSnapshot::alarm_on`.

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::DashboardEvent;

/// Errors reported by audio outputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlarmSinkError {
    #[error("alarm audio unavailable: {0}")]
    Unavailable(String),
    #[error("alarm playback failed: {0}")]
    Playback(String),
}

/// Audio output for the looped alarm asset.
pub trait AlarmSink {
    /// Begin (or resume) looped playback.
    fn play_looped(&mut self) -> Result<(), AlarmSinkError>;

    fn pause(&mut self);

    /// Seek back to the start of the asset.
    fn rewind(&mut self);
}

/// Translates the alarm flag into play / pause+rewind calls, only on edges.
#[derive(Debug)]
pub struct AlarmAudioDriver<S: AlarmSink> {
    sink: S,
    playing: bool,
}

impl<S: AlarmSink> AlarmAudioDriver<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// React to the latest alarm value.
    pub fn apply(&mut self, alarm_on: bool) {
        match (alarm_on, self.playing) {
            (true, false) => match self.sink.play_looped() {
                Ok(()) => {
                    debug!("alarm playback started");
                    self.playing = true;
                }
                Err(err) => warn!(error = %err, "failed to start alarm playback"),
            },
            (false, true) => {
                self.sink.pause();
                self.sink.rewind();
                self.playing = false;
                debug!("alarm playback paused and rewound");
            }
            _ => {}
        }
    }

    /// Feed a dashboard event; only snapshot updates matter.
    pub fn observe(&mut self, event: &DashboardEvent) {
        if let DashboardEvent::SnapshotUpdated(snapshot) = event {
            self.apply(snapshot.alarm_on);
        }
    }
}
