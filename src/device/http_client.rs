//! HTTP client for the air monitor's local web panel.

use super::DeviceClient;
use super::snapshot::SensorSnapshot;
use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;

/// Path of the JSON readings document on the device.
const DATA_PATH: &str = "/data.json";

/// [`DeviceClient`] that reads `/data.json` from the device over HTTP.
///
/// No request timeout is configured here; the coordinator bounds each
/// fetch itself.
pub struct HttpAirMonitor {
    host: String,
    http: reqwest::Client,
    software_version: RwLock<Option<String>>,
}

impl HttpAirMonitor {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_client(host, reqwest::Client::new())
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, ...).
    pub fn with_client(host: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            host: host.into(),
            http,
            software_version: RwLock::new(None),
        }
    }

    fn data_url(&self) -> String {
        format!("http://{}{}", self.host, DATA_PATH)
    }
}

#[async_trait]
impl DeviceClient for HttpAirMonitor {
    async fn update(&self) -> Result<SensorSnapshot> {
        let url = self.data_url();
        log::debug!("Fetching {}", url);

        let response = self.http.get(&url).send().await.map_err(map_transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DeviceError::AuthFailed(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(DeviceError::Api(format!("{} returned {}", url, status)));
        }

        let body = response.text().await.map_err(map_transport)?;
        let payload = SensorSnapshot::from_payload(&body)?;

        if payload.software_version.is_some() {
            *self.software_version.write() = payload.software_version;
        }

        Ok(payload.snapshot)
    }

    fn host(&self) -> String {
        self.host.clone()
    }

    fn software_version(&self) -> Option<String> {
        self.software_version.read().clone()
    }
}

fn map_transport(e: reqwest::Error) -> DeviceError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        DeviceError::Connection(e.to_string())
    } else {
        DeviceError::Api(e.to_string())
    }
}
