//! Session controller: owns the session state machine, the status poller
//! handle, and the canonical (snapshot, error, epoch) record.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    backend::DashboardBackend,
    channel::{DashboardChannels, EventStream},
    error::DashboardError,
    poller::{self, PollTarget, PollingHandle},
    state_machine::SessionStateMachine,
    types::{
        CameraAction, ControlOutcome, DashboardEvent, DrowsinessSnapshot, SessionState,
        StreamEpoch, ToggleOutcome,
    },
    viewport::{FrameSink, StreamViewport},
};

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_STREAM_LOAD_TIMEOUT_MS: u64 = 2_000;

/// Timing knobs for the controller and its viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Status poll period.
    pub poll_interval: Duration,
    /// Upper bound on the viewport loading indicator per stream attempt.
    pub stream_load_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stream_load_timeout: Duration::from_millis(DEFAULT_STREAM_LOAD_TIMEOUT_MS),
        }
    }
}

/// Consistent copy of the controller's record.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub snapshot: DrowsinessSnapshot,
    pub backend_error: Option<String>,
    pub epoch: StreamEpoch,
    pub polling: bool,
}

#[derive(Debug)]
struct SessionShared {
    machine: SessionStateMachine,
    snapshot: DrowsinessSnapshot,
    backend_error: Option<String>,
    epoch: StreamEpoch,
    polling: Option<PollingHandle>,
    next_poll_id: u64,
    // Bumped whenever a stop or teardown invalidates in-flight start commands.
    generation: u64,
}

impl SessionShared {
    fn owns_poll(&self, poll_id: u64) -> bool {
        self.polling.as_ref().map(PollingHandle::id) == Some(poll_id)
    }
}

struct ControllerInner<B> {
    backend: B,
    frame_sink: Arc<dyn FrameSink>,
    config: ControllerConfig,
    channels: DashboardChannels,
    viewport: StreamViewport,
    shared: Mutex<SessionShared>,
}

/// Client-side detection session controller.
///
/// `toggle` is the only user-facing mutator. Toggles that arrive while a
/// start or stop command is still in flight are ignored.
pub struct SessionController<B: DashboardBackend> {
    inner: Arc<ControllerInner<B>>,
    toggle_gate: tokio::sync::Mutex<()>,
}

impl<B: DashboardBackend> SessionController<B> {
    pub fn new(
        backend: B,
        frame_sink: Arc<dyn FrameSink>,
        config: ControllerConfig,
        channels: DashboardChannels,
    ) -> Self {
        info!(
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            stream_load_timeout_ms = config.stream_load_timeout.as_millis() as u64,
            "creating session controller"
        );
        let viewport = StreamViewport::new(config.stream_load_timeout, channels.clone());
        Self {
            inner: Arc::new(ControllerInner {
                backend,
                frame_sink,
                config,
                channels,
                viewport,
                shared: Mutex::new(SessionShared {
                    machine: SessionStateMachine::default(),
                    snapshot: DrowsinessSnapshot::initial(),
                    backend_error: None,
                    epoch: StreamEpoch::default(),
                    polling: None,
                    next_poll_id: 0,
                    generation: 0,
                }),
            }),
            toggle_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Start when off or disconnected, stop when on.
    pub async fn toggle(&self) -> ToggleOutcome {
        let Ok(_gate) = self.toggle_gate.try_lock() else {
            debug!("toggle ignored: camera command already in flight");
            return ToggleOutcome::Ignored;
        };

        if self.inner.lock().machine.state().is_active() {
            info!("user requested stop");
            self.inner.stop().await
        } else {
            info!("user requested start");
            self.inner.start().await
        }
    }

    /// Teardown: cancel everything and send a best-effort stop. No reset.
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }

    pub fn subscribe(&self) -> EventStream {
        self.inner.channels.subscribe()
    }

    pub fn channels(&self) -> &DashboardChannels {
        &self.inner.channels
    }

    pub fn viewport(&self) -> &StreamViewport {
        &self.inner.viewport
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().machine.state()
    }

    pub fn snapshot(&self) -> DrowsinessSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn backend_error(&self) -> Option<String> {
        self.inner.lock().backend_error.clone()
    }

    pub fn epoch(&self) -> StreamEpoch {
        self.inner.lock().epoch
    }

    pub fn view(&self) -> SessionView {
        let shared = self.inner.lock();
        SessionView {
            state: shared.machine.state(),
            snapshot: shared.snapshot.clone(),
            backend_error: shared.backend_error.clone(),
            epoch: shared.epoch,
            polling: shared.polling.is_some(),
        }
    }
}

impl<B: DashboardBackend> ControllerInner<B> {
    fn lock(&self) -> MutexGuard<'_, SessionShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn start(self: &Arc<Self>) -> ToggleOutcome {
        let generation = {
            let mut shared = self.lock();
            match shared.machine.begin_start() {
                Ok(event) => self.channels.emit(event),
                Err(err) => {
                    warn!(error = %err, "start rejected");
                    return ToggleOutcome::Ignored;
                }
            }
            self.set_error(&mut shared, None);
            shared.generation
        };

        let outcome = self.backend.camera_control(CameraAction::Start).await;

        let mut shared = self.lock();
        if shared.generation != generation || shared.machine.state() != SessionState::Starting {
            warn!(
                outcome = ?outcome,
                "start response arrived after the session moved on; discarding"
            );
            return ToggleOutcome::Superseded;
        }

        match outcome {
            ControlOutcome::Success { message } => self.enter_on(&mut shared, &message),
            ControlOutcome::Failed { message } => self.fail_start(
                &mut shared,
                format!("Failed to start camera on backend: {message}"),
            ),
            ControlOutcome::Error { message } => self.fail_start(
                &mut shared,
                format!("Network error: could not reach backend to start camera ({message})"),
            ),
        }
    }

    fn enter_on(self: &Arc<Self>, shared: &mut SessionShared, message: &str) -> ToggleOutcome {
        match shared.machine.on_start_result(true) {
            Ok(event) => self.channels.emit(event),
            Err(err) => {
                error!(error = %err, "start confirmation rejected by state machine");
                return ToggleOutcome::Superseded;
            }
        }

        let epoch = shared.epoch.next();
        shared.epoch = epoch;

        let url = self.backend.video_feed_url(epoch);
        let signals = self.frame_sink.open(&url, epoch);
        self.channels.emit(DashboardEvent::StreamStarted {
            epoch,
            url: url.clone(),
        });
        self.viewport.begin(epoch, signals);

        shared.next_poll_id += 1;
        let poll_id = shared.next_poll_id;
        shared.polling = Some(poller::spawn(
            Arc::clone(self),
            poll_id,
            self.config.poll_interval,
        ));

        info!(%epoch, poll_id, %url, backend_message = %message, "camera started; status polling active");
        ToggleOutcome::Started { epoch }
    }

    fn fail_start(&self, shared: &mut SessionShared, text: String) -> ToggleOutcome {
        error!(error = %text, "backend failed to start camera");
        if let Ok(event) = shared.machine.on_start_result(false) {
            self.channels.emit(event);
        }
        self.replace_snapshot(shared, DrowsinessSnapshot::video_off());
        self.set_error(shared, Some(text.clone()));
        ToggleOutcome::StartFailed { message: text }
    }

    async fn stop(&self) -> ToggleOutcome {
        {
            let mut shared = self.lock();
            if shared.machine.state() != SessionState::On {
                debug!(state = ?shared.machine.state(), "stop skipped: session already left On");
                return ToggleOutcome::Ignored;
            }
            self.cancel_activity(&mut shared);
            if let Ok(event) = shared.machine.stop() {
                self.channels.emit(event);
            }
            shared.generation += 1;
            self.replace_snapshot(&mut shared, DrowsinessSnapshot::video_off());
            self.set_error(&mut shared, None);
        }

        self.send_best_effort_stop().await;
        self.reset();
        ToggleOutcome::Stopped
    }

    async fn shutdown(&self) {
        {
            let mut shared = self.lock();
            self.cancel_activity(&mut shared);
            if shared.machine.state() != SessionState::Off {
                let event = shared.machine.teardown();
                self.channels.emit(event);
            }
            shared.generation += 1;
        }
        info!("controller teardown: sending final stop command");
        self.send_best_effort_stop().await;
    }

    /// Drop back to the `Video Off` defaults with nothing running. The epoch survives.
    fn reset(&self) {
        let mut shared = self.lock();
        self.cancel_activity(&mut shared);
        self.viewport.reset();
        if shared.machine.state() != SessionState::Off {
            let event = shared.machine.teardown();
            self.channels.emit(event);
        }
        if shared.snapshot != DrowsinessSnapshot::video_off() {
            self.replace_snapshot(&mut shared, DrowsinessSnapshot::video_off());
        }
        self.set_error(&mut shared, None);
        debug!(epoch = %shared.epoch, "controller state reset");
    }

    /// Poller first, then the viewport race and the feed.
    fn cancel_activity(&self, shared: &mut SessionShared) {
        if let Some(handle) = shared.polling.take() {
            debug!(poll_id = handle.id(), "cancelling status poller");
            drop(handle);
        }
        self.viewport.halt();
        self.frame_sink.close();
    }

    async fn send_best_effort_stop(&self) {
        match self.backend.camera_control(CameraAction::Stop).await {
            ControlOutcome::Success { message } => info!(%message, "backend confirmed camera stop"),
            other => warn!(outcome = ?other, "backend stop command failed; local state already reset"),
        }
    }

    fn replace_snapshot(&self, shared: &mut SessionShared, snapshot: DrowsinessSnapshot) {
        shared.snapshot = snapshot.clone();
        self.channels.emit(DashboardEvent::SnapshotUpdated(snapshot));
    }

    fn set_error(&self, shared: &mut SessionShared, message: Option<String>) {
        if shared.backend_error == message {
            return;
        }
        shared.backend_error = message.clone();
        self.channels
            .emit(DashboardEvent::BackendErrorChanged { message });
    }
}

impl<B: DashboardBackend> PollTarget for ControllerInner<B> {
    fn fetch(&self) -> impl Future<Output = Result<DrowsinessSnapshot, DashboardError>> + Send {
        self.backend.fetch_status()
    }

    fn on_poll_success(&self, poll_id: u64, snapshot: DrowsinessSnapshot) -> bool {
        let mut shared = self.lock();
        if !shared.owns_poll(poll_id) {
            debug!(poll_id, "ignoring status from retired poller");
            return false;
        }
        self.replace_snapshot(&mut shared, snapshot.sanitized());
        self.set_error(&mut shared, None);
        true
    }

    fn on_poll_failure(&self, poll_id: u64, error: DashboardError) {
        let mut shared = self.lock();
        if !shared.owns_poll(poll_id) {
            debug!(poll_id, error = %error, "ignoring failure from retired poller");
            return;
        }

        self.cancel_activity(&mut shared);
        match shared.machine.on_poll_failure() {
            Ok(event) => self.channels.emit(event),
            Err(err) => warn!(error = %err, "poll failure outside On"),
        }
        error!(poll_id, error = %error, "status poll failed; session disconnected");
        self.set_error(&mut shared, Some(error.poll_failure_text()));
        self.replace_snapshot(&mut shared, DrowsinessSnapshot::disconnected());
    }
}
