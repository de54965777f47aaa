//! Event workers that wire controller events into the view and the alarm output.

use std::{
    io, thread,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use blinkrise_core::{AlarmAudioDriver, AlarmSink, DashboardChannels, recv_event};
use tokio::{runtime::Handle, sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::state::{DashboardState, DashboardView};

/// Callback used to publish new views.
pub type RenderCallback = Arc<dyn Fn(&DashboardView) + Send + Sync + 'static>;

/// Folds controller events into [`DashboardState`] and re-renders on change.
pub struct DashboardBridge {
    state: Arc<Mutex<DashboardState>>,
    event_task: JoinHandle<()>,
}

impl DashboardBridge {
    pub fn spawn(channels: &DashboardChannels, runtime: &Handle, render: RenderCallback) -> Self {
        let state = Arc::new(Mutex::new(DashboardState::new()));
        render(&lock(&state).view());

        let mut events = channels.subscribe();
        let worker_state = Arc::clone(&state);
        let event_task = runtime.spawn(async move {
            debug!("dashboard event worker started");
            while let Some(event) = recv_event(&mut events).await {
                let view = {
                    let mut state = lock(&worker_state);
                    if !state.handle_event(event) {
                        continue;
                    }
                    state.view()
                };
                render(&view);
            }
            debug!("dashboard event worker stopped");
        });

        Self { state, event_task }
    }

    pub fn view(&self) -> DashboardView {
        lock(&self.state).view()
    }
}

impl Drop for DashboardBridge {
    fn drop(&mut self) {
        info!("shutting down dashboard event worker");
        self.event_task.abort();
    }
}

/// Run the alarm driver on its own thread; audio handles stay on that thread.
///
/// The worker silences the sink and exits once every event sender is gone.
pub fn spawn_alarm_worker<S, F>(
    channels: &DashboardChannels,
    make_sink: F,
) -> io::Result<thread::JoinHandle<()>>
where
    S: AlarmSink,
    F: FnOnce() -> S + Send + 'static,
{
    let mut events = channels.subscribe();
    thread::Builder::new()
        .name("alarm-audio".to_owned())
        .spawn(move || {
            let mut driver = AlarmAudioDriver::new(make_sink());
            loop {
                match events.blocking_recv() {
                    Ok(event) => driver.observe(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "alarm worker lagged; waiting for next snapshot")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            driver.apply(false);
            debug!("alarm worker stopped");
        })
}

fn lock(state: &Mutex<DashboardState>) -> MutexGuard<'_, DashboardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blinkrise_core::{AlarmSinkError, DashboardEvent, DrowsinessSnapshot};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedSink {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl AlarmSink for SharedSink {
        fn play_looped(&mut self) -> Result<(), AlarmSinkError> {
            self.calls.lock().expect("calls lock").push("play");
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.lock().expect("calls lock").push("pause");
        }

        fn rewind(&mut self) {
            self.calls.lock().expect("calls lock").push("rewind");
        }
    }

    fn alarm(alarm_on: bool) -> DashboardEvent {
        let mut snapshot = DrowsinessSnapshot::with_status("Drowsy");
        snapshot.alarm_on = alarm_on;
        DashboardEvent::SnapshotUpdated(snapshot)
    }

    #[test]
    fn alarm_worker_follows_snapshots_until_channel_closes() {
        let channels = DashboardChannels::new(16);
        let sink = SharedSink::default();
        let worker_sink = sink.clone();
        let worker = spawn_alarm_worker(&channels, move || worker_sink).expect("spawn worker");

        channels.emit(alarm(true));
        channels.emit(alarm(true));
        channels.emit(alarm(false));
        channels.emit(alarm(true));
        drop(channels);
        worker.join().expect("alarm worker exits on close");

        assert_eq!(
            *sink.calls.lock().expect("calls lock"),
            vec!["play", "pause", "rewind", "play", "pause", "rewind"]
        );
    }

    #[tokio::test]
    async fn bridge_renders_initial_and_changed_views() {
        let channels = DashboardChannels::new(16);
        let rendered = Arc::new(Mutex::new(Vec::<DashboardView>::new()));
        let sink = Arc::clone(&rendered);
        let bridge = DashboardBridge::spawn(
            &channels,
            &Handle::current(),
            Arc::new(move |view: &DashboardView| {
                sink.lock().expect("render lock").push(view.clone());
            }),
        );

        let mut awake = DrowsinessSnapshot::with_status("Awake");
        awake.ear = 0.31;
        channels.emit(DashboardEvent::SnapshotUpdated(awake.clone()));
        channels.emit(DashboardEvent::SnapshotUpdated(awake));

        tokio::time::timeout(Duration::from_secs(2), async {
            while rendered.lock().expect("render lock").len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("bridge should render the update");

        let views = rendered.lock().expect("render lock").clone();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].metrics.status, "Loading...");
        assert_eq!(views[1].metrics.ear, "0.31");
        assert_eq!(bridge.view(), views[1]);
    }
}
