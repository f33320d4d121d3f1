//! Device-side types for the Nettigo Air Monitor.
//!
//! The coordinator only talks to the device through the [`DeviceClient`]
//! trait. [`HttpAirMonitor`] is the networked implementation; tests use
//! scripted fakes.

#[cfg(test)]
pub(crate) mod fake;
pub mod http_client;
pub mod identity;
pub mod snapshot;

pub use http_client::HttpAirMonitor;
pub use identity::{ConnectionType, DeviceIdentity, MANUFACTURER, NAME};
pub use snapshot::SensorSnapshot;

use crate::error::Result;
use async_trait::async_trait;

/// Capability that performs one network round-trip to the device.
///
/// Implementations report failures through the tagged
/// [`DeviceError`](crate::error::DeviceError) variants so callers can match
/// on them exhaustively.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Fetch the current sensor readings.
    async fn update(&self) -> Result<SensorSnapshot>;

    /// Network address of the device.
    fn host(&self) -> String;

    /// Firmware version as last reported by the device.
    fn software_version(&self) -> Option<String>;
}
