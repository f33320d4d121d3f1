//! Sensor readings produced by one fetch.
//!
//! The device publishes its readings at `/data.json` as a list of
//! `{"value_type": ..., "value": ...}` pairs. Values arrive as strings,
//! pressures in Pa.

use crate::error::{DeviceError, Result};
use serde::{Deserialize, Serialize};

/// One complete set of readings from a single fetch.
///
/// Readings the device did not report (sensor not fitted) are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub bme280_humidity: Option<f64>,
    pub bme280_pressure: Option<f64>,
    pub bme280_temperature: Option<f64>,
    pub bmp180_pressure: Option<f64>,
    pub bmp180_temperature: Option<f64>,
    pub bmp280_pressure: Option<f64>,
    pub bmp280_temperature: Option<f64>,
    pub dht22_humidity: Option<f64>,
    pub dht22_temperature: Option<f64>,
    pub heca_humidity: Option<f64>,
    pub heca_temperature: Option<f64>,
    pub mhz14a_carbon_dioxide: Option<f64>,
    pub pms_p0: Option<f64>,
    pub pms_p1: Option<f64>,
    pub pms_p2: Option<f64>,
    pub sds011_p1: Option<f64>,
    pub sds011_p2: Option<f64>,
    pub sht3x_humidity: Option<f64>,
    pub sht3x_temperature: Option<f64>,
    pub signal: Option<f64>,
    pub sps30_p0: Option<f64>,
    pub sps30_p1: Option<f64>,
    pub sps30_p2: Option<f64>,
    pub sps30_p4: Option<f64>,
}

/// Parsed `/data.json` document.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePayload {
    pub snapshot: SensorSnapshot,
    pub software_version: Option<String>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    software_version: Option<String>,
    #[serde(default)]
    sensordatavalues: Option<Vec<RawValue>>,
}

#[derive(Deserialize)]
struct RawValue {
    value_type: String,
    value: serde_json::Value,
}

/// Pa to hPa.
const PRESSURE_SCALE: f64 = 0.01;

impl SensorSnapshot {
    /// Parse and validate a `/data.json` body.
    ///
    /// Malformed JSON is an API error; a document without readings or with a
    /// non-numeric reading is invalid sensor data. Unknown value types are
    /// skipped.
    pub fn from_payload(body: &str) -> Result<DevicePayload> {
        let raw: RawPayload = serde_json::from_str(body)
            .map_err(|e| DeviceError::Api(format!("malformed data.json: {}", e)))?;

        let values = match raw.sensordatavalues {
            Some(values) if !values.is_empty() => values,
            _ => {
                return Err(DeviceError::InvalidSensorData(
                    "no sensor data values in payload".to_string(),
                ));
            }
        };

        let mut snapshot = SensorSnapshot::default();
        for raw_value in values {
            let Some((slot, scale)) = snapshot.slot(&raw_value.value_type) else {
                log::trace!("Skipping unknown value type {}", raw_value.value_type);
                continue;
            };
            let value = parse_number(&raw_value.value).ok_or_else(|| {
                DeviceError::InvalidSensorData(format!(
                    "{} is not numeric: {}",
                    raw_value.value_type, raw_value.value
                ))
            })?;
            *slot = Some(value * scale);
        }

        Ok(DevicePayload {
            snapshot,
            software_version: raw.software_version,
        })
    }

    /// Whether the snapshot carries no readings at all.
    pub fn is_empty(&self) -> bool {
        *self == SensorSnapshot::default()
    }

    fn slot(&mut self, value_type: &str) -> Option<(&mut Option<f64>, f64)> {
        let slot = match value_type {
            "BME280_humidity" => &mut self.bme280_humidity,
            "BME280_pressure" => return Some((&mut self.bme280_pressure, PRESSURE_SCALE)),
            "BME280_temperature" => &mut self.bme280_temperature,
            "BMP_pressure" => return Some((&mut self.bmp180_pressure, PRESSURE_SCALE)),
            "BMP_temperature" => &mut self.bmp180_temperature,
            "BMP280_pressure" => return Some((&mut self.bmp280_pressure, PRESSURE_SCALE)),
            "BMP280_temperature" => &mut self.bmp280_temperature,
            "humidity" => &mut self.dht22_humidity,
            "temperature" => &mut self.dht22_temperature,
            "HECA_humidity" => &mut self.heca_humidity,
            "HECA_temperature" => &mut self.heca_temperature,
            "conc_co2_ppm" => &mut self.mhz14a_carbon_dioxide,
            "PMS_P0" => &mut self.pms_p0,
            "PMS_P1" => &mut self.pms_p1,
            "PMS_P2" => &mut self.pms_p2,
            "SDS_P1" => &mut self.sds011_p1,
            "SDS_P2" => &mut self.sds011_p2,
            "SHT3X_humidity" => &mut self.sht3x_humidity,
            "SHT3X_temperature" => &mut self.sht3x_temperature,
            "signal" => &mut self.signal,
            "SPS30_P0" => &mut self.sps30_p0,
            "SPS30_P1" => &mut self.sps30_p1,
            "SPS30_P2" => &mut self.sps30_p2,
            "SPS30_P4" => &mut self.sps30_p4,
            _ => return None,
        };
        Some((slot, 1.0))
    }
}

fn parse_number(value: &serde_json::Value) -> Option<f64> {
    let number = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
