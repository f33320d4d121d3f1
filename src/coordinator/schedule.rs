//! Timer driving the periodic refresh.
//!
//! One task per coordinator. The next tick is armed only after the previous
//! cycle completes, so cycles never pile up behind a slow device.

use super::RefreshCoordinator;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(super) struct RefreshTimer {
    cancel: CancellationToken,
    wake: Notify,
    started: AtomicBool,
}

impl RefreshTimer {
    pub(super) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            wake: Notify::new(),
            started: AtomicBool::new(false),
        }
    }
}

impl RefreshCoordinator {
    /// Start refreshing every `interval` on a background task.
    ///
    /// Every tick fetches regardless of how the previous cycle ended;
    /// failures are reported by [`refresh_once`](Self::refresh_once) itself.
    /// The task ends only after [`shutdown`](Self::shutdown). Returns `None`
    /// if the schedule was already started.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.timer.started.swap(true, Ordering::SeqCst) {
            warn!(target: self.name.as_str(), "Refresh schedule for {} already running", self.name);
            return None;
        }

        let coordinator = Arc::clone(self);
        Some(tokio::spawn(async move { coordinator.run_schedule().await }))
    }

    async fn run_schedule(&self) {
        info!(
            target: self.name.as_str(),
            "Refreshing {} data every {:?}", self.name, self.interval
        );

        loop {
            tokio::select! {
                _ = self.timer.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.timer.wake.notified() => {
                    debug!(target: self.name.as_str(), "Refresh of {} data requested", self.name);
                }
            }

            tokio::select! {
                _ = self.timer.cancel.cancelled() => break,
                _ = self.refresh_once() => {}
            }
        }

        debug!(target: self.name.as_str(), "Refresh schedule for {} stopped", self.name);
    }

    /// Wake the schedule for an immediate refresh.
    ///
    /// If a cycle is in progress the request runs right after it.
    pub fn request_refresh(&self) {
        self.timer.wake.notify_one();
    }

    /// Stop the schedule.
    ///
    /// A pending wait or in-flight fetch is abandoned immediately and no
    /// further ticks run. The stored snapshot stays readable.
    pub fn shutdown(&self) {
        if !self.timer.cancel.is_cancelled() {
            debug!(target: self.name.as_str(), "Shutting down {} coordinator", self.name);
        }
        self.timer.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.timer.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CoordinatorUpdate, RefreshCoordinator};
    use crate::device::fake::{FakeAirMonitor, Step, snapshot};
    use crate::error::{DeviceError, FailureKind};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn build(client: &Arc<FakeAirMonitor>, interval: Duration) -> Arc<RefreshCoordinator> {
        Arc::new(RefreshCoordinator::new(
            client.clone(),
            Some("AA:BB:CC".to_string()),
            interval,
        ))
    }

    async fn next_update(rx: &mut watch::Receiver<CoordinatorUpdate>) -> CoordinatorUpdate {
        rx.changed().await.unwrap();
        rx.borrow_and_update().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_survives_timeout() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        client
            .push(Step::Delay(Duration::from_secs(30), snapshot(1.0)))
            .push(Step::Succeed(snapshot(2.0)));
        let coordinator = build(&client, INTERVAL);
        let mut rx = coordinator.subscribe();
        let handle = coordinator.start().unwrap();

        let update = next_update(&mut rx).await;
        assert!(!update.last_update_success);
        assert_eq!(update.last_failure.unwrap().kind(), FailureKind::Timeout);
        assert!(coordinator.current_snapshot().is_none());

        let update = next_update(&mut rx).await;
        assert!(update.last_update_success);
        assert_eq!(update.snapshot.as_deref(), Some(&snapshot(2.0)));
        assert_eq!(client.calls(), 2);

        coordinator.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_keep_schedule_running() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        client
            .push(Step::Fail(DeviceError::Connection("down".into())))
            .push(Step::Fail(DeviceError::Api("garbled".into())))
            .push(Step::Fail(DeviceError::InvalidSensorData("empty".into())))
            .push(Step::Succeed(snapshot(4.0)));
        let coordinator = build(&client, INTERVAL);
        let mut rx = coordinator.subscribe();
        let handle = coordinator.start().unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let update = next_update(&mut rx).await;
            kinds.push(update.last_failure.unwrap().kind());
        }
        assert_eq!(
            kinds,
            [
                FailureKind::Connection,
                FailureKind::Api,
                FailureKind::InvalidSensorData
            ]
        );

        let update = next_update(&mut rx).await;
        assert_eq!(update.snapshot.as_deref(), Some(&snapshot(4.0)));

        coordinator.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_spaced_by_interval() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        client
            .push(Step::Delay(Duration::from_secs(5), snapshot(1.0)))
            .push(Step::Succeed(snapshot(2.0)));
        let coordinator = build(&client, INTERVAL);
        let mut rx = coordinator.subscribe();
        let began = Instant::now();
        let handle = coordinator.start().unwrap();

        next_update(&mut rx).await;
        let first = began.elapsed();
        next_update(&mut rx).await;
        let second = began.elapsed();

        assert!(first >= INTERVAL + Duration::from_secs(5));
        // next tick armed after the slow cycle finished
        assert!(second - first >= INTERVAL);

        coordinator.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_error_keeps_schedule_running() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        client
            .push(Step::Fail(DeviceError::AuthFailed("401".into())))
            .push(Step::Succeed(snapshot(2.0)));
        let coordinator = build(&client, INTERVAL);
        let mut rx = coordinator.subscribe();
        let handle = coordinator.start().unwrap();

        let update = next_update(&mut rx).await;
        assert!(!update.last_update_success);
        assert!(update.snapshot.is_none());
        assert!(!handle.is_finished());

        let update = next_update(&mut rx).await;
        assert!(update.last_update_success);
        assert_eq!(update.snapshot.as_deref(), Some(&snapshot(2.0)));

        // script exhausted: the third tick still fetches
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(client.calls(), 3);
        assert!(!handle.is_finished());

        coordinator.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_refresh_skips_wait() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        client.push(Step::Succeed(snapshot(1.0)));
        let coordinator = build(&client, Duration::from_secs(3600));
        let mut rx = coordinator.subscribe();
        let began = Instant::now();
        let handle = coordinator.start().unwrap();

        coordinator.request_refresh();
        let update = next_update(&mut rx).await;
        assert_eq!(update.snapshot.as_deref(), Some(&snapshot(1.0)));
        assert!(began.elapsed() < Duration::from_secs(1));

        coordinator.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_in_flight_fetch() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        client.push(Step::Delay(Duration::from_secs(5), snapshot(1.0)));
        let coordinator = build(&client, INTERVAL);
        let handle = coordinator.start().unwrap();

        // tick at 60s, fetch would finish at 65s
        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(client.calls(), 1);

        coordinator.shutdown();
        assert!(coordinator.is_shut_down());
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(client.calls(), 1);
        assert!(coordinator.current_snapshot().is_none());
        assert!(coordinator.last_update_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        let coordinator = build(&client, INTERVAL);
        let handle = coordinator.start().unwrap();

        coordinator.shutdown();
        handle.await.unwrap();
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let client = Arc::new(FakeAirMonitor::new("10.0.0.5"));
        let coordinator = build(&client, INTERVAL);

        let handle = coordinator.start().unwrap();
        assert!(coordinator.start().is_none());

        coordinator.shutdown();
        handle.await.unwrap();
    }
}
