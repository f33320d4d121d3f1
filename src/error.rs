use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Failures reported by a [`DeviceClient`](crate::device::DeviceClient).
#[derive(ThisError, Debug)]
pub enum DeviceError {
    /// The device answered with a malformed or erroneous protocol response.
    #[error("API error: {0}")]
    Api(String),

    /// Transport-level failure reaching the device.
    #[error("connection error: {0}")]
    Connection(String),

    /// The payload parsed but failed semantic validation.
    #[error("invalid sensor data: {0}")]
    InvalidSensorData(String),

    /// The device rejected the request as unauthorized.
    #[error("authorization failed: {0}")]
    AuthFailed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Category of a recognized refresh failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Api,
    Connection,
    InvalidSensorData,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Api => "api",
            FailureKind::Connection => "connection",
            FailureKind::InvalidSensorData => "invalid sensor data",
        };
        f.write_str(name)
    }
}

/// What a recognized failure wraps.
#[derive(ThisError, Debug)]
pub enum FailureCause {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Device(DeviceError),
}

/// The single failure signal reported for every recognized failure category.
#[derive(ThisError, Debug)]
#[error("{cause}")]
pub struct UpdateFailed {
    kind: FailureKind,
    #[source]
    cause: FailureCause,
}

impl UpdateFailed {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            cause: FailureCause::Timeout(after),
        }
    }

    /// Wrap a device error if it belongs to a recognized category.
    ///
    /// Returns the error unchanged otherwise.
    pub fn from_device(error: DeviceError) -> std::result::Result<Self, DeviceError> {
        let kind = match error {
            DeviceError::Api(_) => FailureKind::Api,
            DeviceError::Connection(_) => FailureKind::Connection,
            DeviceError::InvalidSensorData(_) => FailureKind::InvalidSensorData,
            // sensor data is readable without authorization
            DeviceError::AuthFailed(_) | DeviceError::Other(_) => return Err(error),
        };
        Ok(Self {
            kind,
            cause: FailureCause::Device(error),
        })
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn cause(&self) -> &FailureCause {
        &self.cause
    }
}

/// Outcome of a refresh cycle that did not produce a snapshot.
#[derive(ThisError, Debug)]
pub enum RefreshError {
    /// Shared with the coordinator state, which keeps the last failure.
    #[error("update failed: {0}")]
    UpdateFailed(#[source] Arc<UpdateFailed>),

    /// An error outside the recognized categories, passed through as-is.
    #[error("unexpected error fetching device data: {0}")]
    Unexpected(#[source] DeviceError),
}

impl RefreshError {
    pub fn is_update_failed(&self) -> bool {
        matches!(self, RefreshError::UpdateFailed(_))
    }

    /// The wrapped failure, if this is a recognized one.
    pub fn update_failed(&self) -> Option<&UpdateFailed> {
        match self {
            RefreshError::UpdateFailed(failed) => Some(failed.as_ref()),
            RefreshError::Unexpected(_) => None,
        }
    }
}

impl From<UpdateFailed> for RefreshError {
    fn from(failed: UpdateFailed) -> Self {
        RefreshError::UpdateFailed(Arc::new(failed))
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
