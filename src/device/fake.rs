//! Scripted [`DeviceClient`] for tests.

use super::{DeviceClient, SensorSnapshot};
use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the next call to `update()` does.
pub enum Step {
    Succeed(SensorSnapshot),
    Fail(DeviceError),
    /// Resolve successfully after the given delay.
    Delay(Duration, SensorSnapshot),
}

pub struct FakeAirMonitor {
    steps: Mutex<VecDeque<Step>>,
    host: RwLock<String>,
    software_version: RwLock<Option<String>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeAirMonitor {
    pub fn new(host: &str) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            host: RwLock::new(host.to_string()),
            software_version: RwLock::new(None),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, step: Step) -> &Self {
        self.steps.lock().push_back(step);
        self
    }

    pub fn set_host(&self, host: &str) {
        *self.host.write() = host.to_string();
    }

    pub fn set_software_version(&self, version: &str) {
        *self.software_version.write() = Some(version.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the call is abandoned.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceClient for FakeAirMonitor {
    async fn update(&self) -> Result<SensorSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Succeed(snapshot)) => Ok(snapshot),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Delay(delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            None => Err(DeviceError::Other("no scripted step left".into())),
        }
    }

    fn host(&self) -> String {
        self.host.read().clone()
    }

    fn software_version(&self) -> Option<String> {
        self.software_version.read().clone()
    }
}

/// Snapshot distinguishable by its PM10 reading.
pub fn snapshot(pm10: f64) -> SensorSnapshot {
    SensorSnapshot {
        sds011_p1: Some(pm10),
        ..Default::default()
    }
}
