use std::{future::Future, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{error::DashboardError, types::DrowsinessSnapshot};

/// Receiver of poll results. Results carry the poll id they were issued under.
pub(crate) trait PollTarget: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<DrowsinessSnapshot, DashboardError>> + Send;

    /// Apply a successful poll. Returns `false` when `poll_id` is no longer live.
    fn on_poll_success(&self, poll_id: u64, snapshot: DrowsinessSnapshot) -> bool;

    fn on_poll_failure(&self, poll_id: u64, error: DashboardError);
}

/// Live status poller. Dropping the handle cancels the task.
#[derive(Debug)]
pub(crate) struct PollingHandle {
    id: u64,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Spawn the poller: one request immediately, then one per `period`.
///
/// Requests are serialized; a slow response delays the next tick instead of
/// overlapping with it.
pub(crate) fn spawn<T: PollTarget>(target: Arc<T>, poll_id: u64, period: Duration) -> PollingHandle {
    let stop = CancellationToken::new();
    let stop_child = stop.child_token();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_child.cancelled() => break,
                _ = ticker.tick() => {}
            }

            trace!(poll_id, "polling drowsiness status");
            let result = tokio::select! {
                biased;
                _ = stop_child.cancelled() => break,
                result = target.fetch() => result,
            };

            match result {
                Ok(snapshot) => {
                    if !target.on_poll_success(poll_id, snapshot) {
                        break;
                    }
                }
                Err(err) => {
                    target.on_poll_failure(poll_id, err);
                    break;
                }
            }
        }
        debug!(poll_id, "status poller exiting");
    });

    PollingHandle {
        id: poll_id,
        stop,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct CountingTarget {
        fetches: AtomicUsize,
        fail_on: Option<usize>,
        failures: Mutex<Vec<(u64, String)>>,
        retired: bool,
    }

    impl PollTarget for CountingTarget {
        async fn fetch(&self) -> Result<DrowsinessSnapshot, DashboardError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(n) == self.fail_on {
                return Err(DashboardError::transport("connect_failed", "refused"));
            }
            Ok(DrowsinessSnapshot::with_status("Awake"))
        }

        fn on_poll_success(&self, _poll_id: u64, _snapshot: DrowsinessSnapshot) -> bool {
            !self.retired
        }

        fn on_poll_failure(&self, poll_id: u64, error: DashboardError) {
            self.failures
                .lock()
                .expect("failures lock")
                .push((poll_id, error.code));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_on_period() {
        let target = Arc::new(CountingTarget::default());
        let handle = spawn(Arc::clone(&target), 1, Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(target.fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(target.fetches.load(Ordering::SeqCst), 3);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_polling_after_reporting() {
        let target = Arc::new(CountingTarget {
            fail_on: Some(2),
            ..CountingTarget::default()
        });
        let handle = spawn(Arc::clone(&target), 7, Duration::from_millis(500));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(target.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(
            *target.failures.lock().expect("failures lock"),
            vec![(7, "connect_failed".to_owned())]
        );
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_task() {
        let target = Arc::new(CountingTarget::default());
        let handle = spawn(Arc::clone(&target), 1, Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(target.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retired_poll_id_stops_loop() {
        let target = Arc::new(CountingTarget {
            retired: true,
            ..CountingTarget::default()
        });
        let handle = spawn(Arc::clone(&target), 1, Duration::from_millis(500));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(target.fetches.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }
}
