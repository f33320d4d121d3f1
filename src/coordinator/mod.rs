//! Periodic refresh of air monitor readings.
//!
//! [`RefreshCoordinator`] owns one [`DeviceClient`] and keeps the most recent
//! successful [`SensorSnapshot`]. Each refresh cycle is bounded by a timeout;
//! timeouts, API errors, connection errors and invalid sensor data are folded
//! into [`UpdateFailed`] and leave the stored snapshot untouched. Any other
//! client error is handed back unchanged.

pub mod notifier;
mod schedule;

pub use notifier::{ListenerId, UpdateListener, UpdateNotifier};

use crate::device::{DeviceClient, DeviceIdentity, SensorSnapshot};
use crate::error::{RefreshError, UpdateFailed};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use schedule::RefreshTimer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};

/// Log target and display name of the integration.
pub const DOMAIN: &str = "nam";

/// Time between scheduled refreshes.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(6 * 60);

/// Shortest interval the schedule accepts.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on a single fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Public state handed to subscribers after each cycle.
#[derive(Debug, Clone)]
pub struct CoordinatorUpdate {
    /// Last known good readings, `None` until the first success.
    pub snapshot: Option<Arc<SensorSnapshot>>,
    pub last_update_success: bool,
    pub last_failure: Option<Arc<UpdateFailed>>,
    /// When `snapshot` was fetched.
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for CoordinatorUpdate {
    fn default() -> Self {
        Self {
            snapshot: None,
            last_update_success: true,
            last_failure: None,
            last_update: None,
        }
    }
}

pub struct RefreshCoordinator {
    name: String,
    client: Arc<dyn DeviceClient>,
    unique_id: Option<String>,
    interval: Duration,
    timeout: Duration,
    state: RwLock<CoordinatorUpdate>,
    notifier: UpdateNotifier,
    /// Held for the whole cycle so refreshes never overlap.
    refresh_lock: Mutex<()>,
    timer: RefreshTimer,
}

impl RefreshCoordinator {
    /// Bind a coordinator to one device. Performs no network activity.
    ///
    /// Intervals below [`MIN_UPDATE_INTERVAL`] are raised to it.
    pub fn new(
        client: Arc<dyn DeviceClient>,
        unique_id: Option<String>,
        interval: Duration,
    ) -> Self {
        if interval < MIN_UPDATE_INTERVAL {
            warn!(
                target: DOMAIN,
                "Update interval {:?} too short, using {:?}", interval, MIN_UPDATE_INTERVAL
            );
        }
        Self {
            name: DOMAIN.to_string(),
            client,
            unique_id,
            interval: interval.max(MIN_UPDATE_INTERVAL),
            timeout: DEFAULT_TIMEOUT,
            state: RwLock::new(CoordinatorUpdate::default()),
            notifier: UpdateNotifier::new(CoordinatorUpdate::default()),
            refresh_lock: Mutex::new(()),
            timer: RefreshTimer::new(),
        }
    }

    /// Override the per-fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name used in log messages and as the log target.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one refresh cycle.
    ///
    /// Waits for any cycle already in progress before fetching.
    pub async fn refresh_once(&self) -> Result<Arc<SensorSnapshot>, RefreshError> {
        let _cycle = self.refresh_lock.lock().await;
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.client.update()).await {
            Ok(Ok(snapshot)) => Ok(Arc::new(snapshot)),
            Ok(Err(error)) => match UpdateFailed::from_device(error) {
                Ok(failed) => Err(Arc::new(failed)),
                Err(unexpected) => {
                    error!(
                        target: self.name.as_str(),
                        "Unexpected error fetching {} data: {}", self.name, unexpected
                    );
                    self.publish_unexpected();
                    return Err(RefreshError::Unexpected(unexpected));
                }
            },
            Err(_elapsed) => Err(Arc::new(UpdateFailed::timeout(self.timeout))),
        };

        debug!(
            target: self.name.as_str(),
            "Finished fetching {} data in {:.3} seconds (success: {})",
            self.name,
            started.elapsed().as_secs_f64(),
            outcome.is_ok()
        );

        match outcome {
            Ok(snapshot) => {
                self.publish_success(snapshot.clone());
                Ok(snapshot)
            }
            Err(failed) => {
                self.publish_failure(failed.clone());
                Err(RefreshError::UpdateFailed(failed))
            }
        }
    }

    fn publish_success(&self, snapshot: Arc<SensorSnapshot>) {
        let update = {
            let mut state = self.state.write();
            if !state.last_update_success {
                info!(target: self.name.as_str(), "Fetching {} data recovered", self.name);
            }
            *state = CoordinatorUpdate {
                snapshot: Some(snapshot),
                last_update_success: true,
                last_failure: None,
                last_update: Some(Utc::now()),
            };
            state.clone()
        };
        self.notifier.notify(update);
    }

    fn publish_failure(&self, failed: Arc<UpdateFailed>) {
        let update = {
            let mut state = self.state.write();
            if state.last_update_success {
                error!(target: self.name.as_str(), "Error fetching {} data: {}", self.name, failed);
            } else {
                debug!(target: self.name.as_str(), "Error fetching {} data: {}", self.name, failed);
            }
            state.last_update_success = false;
            state.last_failure = Some(failed);
            state.clone()
        };
        self.notifier.notify(update);
    }

    /// Mark the last cycle unsuccessful without attaching a recognized failure.
    fn publish_unexpected(&self) {
        let update = {
            let mut state = self.state.write();
            state.last_update_success = false;
            state.last_failure = None;
            state.clone()
        };
        self.notifier.notify(update);
    }

    /// Last known good readings, `None` if no fetch has succeeded yet.
    pub fn current_snapshot(&self) -> Option<Arc<SensorSnapshot>> {
        self.state.read().snapshot.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.state.read().last_update_success
    }

    pub fn last_failure(&self) -> Option<Arc<UpdateFailed>> {
        self.state.read().last_failure.clone()
    }

    /// Copy of the full public state.
    pub fn state(&self) -> CoordinatorUpdate {
        self.state.read().clone()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Device metadata, reading host and firmware version from the client now.
    pub fn device_identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(
            self.unique_id(),
            &self.client.host(),
            self.client.software_version(),
        )
    }

    /// Register a callback run after every completed cycle.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CoordinatorUpdate) + Send + Sync + 'static,
    {
        self.notifier.add_listener(Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.notifier.remove_listener(id)
    }

    /// Receiver woken after every completed cycle.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorUpdate> {
        self.notifier.subscribe()
    }
}
