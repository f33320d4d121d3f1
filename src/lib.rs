//! Refresh coordinator for Nettigo Air Monitor devices.
//!
//! Polls a monitor's sensor readings on a fixed schedule, bounds each fetch
//! with a timeout, and keeps the last good snapshot available to
//! subscribers while reporting failures through a single `UpdateFailed`
//! signal.

pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;

pub use coordinator::{CoordinatorUpdate, RefreshCoordinator};
pub use device::{DeviceClient, DeviceIdentity, HttpAirMonitor, SensorSnapshot};
pub use error::{DeviceError, FailureKind, RefreshError, UpdateFailed};
