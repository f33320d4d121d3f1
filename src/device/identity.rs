//! Static device metadata for registries and UIs.

use serde::Serialize;
use std::collections::BTreeSet;

/// Display name reported for every device.
pub const NAME: &str = "Nettigo Air Monitor";

/// Manufacturer reported for every device.
pub const MANUFACTURER: &str = "Nettigo";

/// How a connection identifier should be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Hardware network (MAC) address.
    NetworkMac,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::NetworkMac => "mac",
        }
    }
}

/// Descriptive record for one air monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub connections: BTreeSet<(ConnectionType, String)>,
    pub name: String,
    pub sw_version: Option<String>,
    pub manufacturer: String,
    pub configuration_url: String,
}

impl DeviceIdentity {
    /// Build the identity for a device reachable at `host`.
    ///
    /// Without a stable identifier the device carries no connections.
    pub fn new(unique_id: Option<&str>, host: &str, sw_version: Option<String>) -> Self {
        let connections = unique_id
            .map(|id| (ConnectionType::NetworkMac, id.to_string()))
            .into_iter()
            .collect();

        Self {
            connections,
            name: NAME.to_string(),
            sw_version,
            manufacturer: MANUFACTURER.to_string(),
            configuration_url: configuration_url(host),
        }
    }

    /// Whether this identity carries the given connection.
    pub fn has_connection(&self, kind: ConnectionType, id: &str) -> bool {
        self.connections
            .iter()
            .any(|(k, value)| *k == kind && value == id)
    }
}

/// Management URL of the device's web panel.
pub fn configuration_url(host: &str) -> String {
    format!("http://{}/", host)
}
