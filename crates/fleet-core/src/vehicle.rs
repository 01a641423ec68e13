//! # Vehicle Normalizer
//!
//! Maps heterogeneous raw vehicle payloads into one canonical [`Vehicle`].
//!
//! ## Field Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Raw Payload → Canonical Vehicle                      │
//! │                                                                         │
//! │  vehicleNumber | id               → id            (required)           │
//! │  driverName | driver_name         → driver_name   ("N/A")              │
//! │  driverPhone | driver_phone       → driver_phone  ("N/A")              │
//! │  status                           → status        (normalized)         │
//! │  destination                      → destination   ("N/A")              │
//! │  currentLocation.lat | latitude   ┐                                    │
//! │  currentLocation.lng | longitude  ┴→ location     (both or nothing)    │
//! │  speed                            → speed         (>= 0, default 0)    │
//! │  estimatedArrival | eta           → eta_text      ("-")                │
//! │  batteryLevel | battery_level     → battery_level ([0,100], 0)         │
//! │  fuelLevel | fuel_level           → fuel_level    ([0,100], 0)         │
//! │  lastUpdated | last_updated       → last_updated_at (epoch ms, opt)    │
//! │                                   → last_updated_text ("N/A")          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Totality
//! Normalization never fails on shape. Every missing or malformed optional
//! field falls back to its default. The only rejection is a record with no
//! id, reported as [`CoreError::MissingVehicleId`] so the caller can drop it.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Default text for absent driver/destination/update fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Sentinel ETA text when the source provides none.
pub const NO_ETA: &str = "-";

/// Epoch values below this are taken as seconds rather than milliseconds.
const EPOCH_SECONDS_CEILING: i64 = 100_000_000_000;

// =============================================================================
// Vehicle Status
// =============================================================================

/// Operational status of a vehicle.
///
/// Source spellings differ between endpoints (`moving`, `en-route`,
/// `en_route`). Unrecognized values are kept lower-cased in [`Other`] so the
/// render layer can still show them; aggregation counts them in no bucket.
///
/// [`Other`]: VehicleStatus::Other
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VehicleStatus {
    Idle,
    EnRoute,
    Delivered,
    Maintenance,
    Other(String),
}

impl VehicleStatus {
    /// Normalizes a source status string.
    pub fn from_raw(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "idle" => VehicleStatus::Idle,
            "moving" | "en-route" | "en_route" | "enroute" => VehicleStatus::EnRoute,
            "delivered" => VehicleStatus::Delivered,
            "maintenance" => VehicleStatus::Maintenance,
            _ => VehicleStatus::Other(lowered),
        }
    }

    /// Parses a filter token as used by the status filter buttons.
    ///
    /// `"all"` (or an empty token) means no filter and yields `Ok(None)`.
    /// The token must name one of the four known statuses otherwise.
    pub fn from_filter_token(token: &str) -> CoreResult<Option<Self>> {
        let trimmed = token.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(None);
        }
        match VehicleStatus::from_raw(trimmed) {
            VehicleStatus::Other(other) => Err(CoreError::UnknownStatus(other)),
            known => Ok(Some(known)),
        }
    }

    /// Canonical wire spelling, also used as the filtered endpoint's path token.
    pub fn as_str(&self) -> &str {
        match self {
            VehicleStatus::Idle => "idle",
            VehicleStatus::EnRoute => "en_route",
            VehicleStatus::Delivered => "delivered",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Other(s) => s.as_str(),
        }
    }

    /// Returns true for the four statuses the aggregator counts.
    pub fn is_known(&self) -> bool {
        !matches!(self, VehicleStatus::Other(_))
    }
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VehicleStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VehicleStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(VehicleStatus::from_raw(&raw))
    }
}

// =============================================================================
// Location
// =============================================================================

/// A geographic position. Always complete: never only one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

// =============================================================================
// Vehicle
// =============================================================================

/// Canonical vehicle view model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Vehicle {
    /// Stable identity across REST and push sources.
    pub id: String,

    pub driver_name: String,

    pub driver_phone: String,

    #[ts(type = "string")]
    pub status: VehicleStatus,

    pub destination: String,

    pub location: Option<Location>,

    /// Non-negative; 0 when absent.
    pub speed: f64,

    /// Source ETA text or [`NO_ETA`].
    pub eta_text: String,

    /// Percentage in [0, 100].
    pub battery_level: f64,

    /// Percentage in [0, 100].
    pub fuel_level: f64,

    /// Parsed from `last_updated_text`; absent when unparsable.
    #[ts(type = "number | null")]
    pub last_updated_at: Option<i64>,

    /// Original source string, for display only.
    pub last_updated_text: String,
}

impl Vehicle {
    /// Formats the location the way the list view shows it.
    pub fn location_text(&self) -> String {
        match self.location {
            Some(loc) => format!("{:.6}, {:.6}", loc.lat, loc.lng),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalizes one raw record.
///
/// ## Example
/// ```rust
/// use fleet_core::vehicle::{normalize, VehicleStatus};
/// use serde_json::json;
///
/// let v = normalize(&json!({ "id": "TRK-1", "status": "moving" })).unwrap();
/// assert_eq!(v.status, VehicleStatus::EnRoute);
/// assert_eq!(v.driver_name, "N/A");
/// ```
pub fn normalize(raw: &Value) -> CoreResult<Vehicle> {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let id = text_field(obj, &["vehicleNumber", "id"]).ok_or(CoreError::MissingVehicleId)?;

    let last_updated_raw = first_present(obj, &["lastUpdated", "last_updated"]);
    let last_updated_at = last_updated_raw.and_then(parse_timestamp);
    let last_updated_text = last_updated_raw
        .and_then(value_text)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .map(VehicleStatus::from_raw)
        .unwrap_or_else(|| VehicleStatus::Other("unknown".to_string()));

    Ok(Vehicle {
        id,
        driver_name: text_or(obj, &["driverName", "driver_name"], NOT_AVAILABLE),
        driver_phone: text_or(obj, &["driverPhone", "driver_phone"], NOT_AVAILABLE),
        status,
        destination: text_or(obj, &["destination"], NOT_AVAILABLE),
        location: extract_location(obj),
        speed: number_field(obj, &["speed"])
            .filter(|s| *s > 0.0)
            .unwrap_or(0.0),
        eta_text: text_or(obj, &["estimatedArrival", "eta"], NO_ETA),
        battery_level: percentage(obj, &["batteryLevel", "battery_level"]),
        fuel_level: percentage(obj, &["fuelLevel", "fuel_level"]),
        last_updated_at,
        last_updated_text,
    })
}

/// Normalizes a batch, dropping records without an id.
pub fn normalize_all(raws: &[Value]) -> Vec<Vehicle> {
    raws.iter()
        .enumerate()
        .filter_map(|(index, raw)| match normalize(raw) {
            Ok(vehicle) => Some(vehicle),
            Err(e) => {
                warn!(index, error = %e, "Dropping unusable vehicle record");
                None
            }
        })
        .collect()
}

/// Parses a source update time into epoch milliseconds.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS` (taken as UTC), and bare
/// epoch numbers (seconds or milliseconds). Anything else yields `None`.
pub fn parse_timestamp(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .map(epoch_to_millis),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// String form of [`parse_timestamp`].
pub fn parse_timestamp_str(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    s.parse::<i64>().ok().map(epoch_to_millis)
}

fn epoch_to_millis(value: i64) -> i64 {
    if value.abs() < EPOCH_SECONDS_CEILING {
        value * 1000
    } else {
        value
    }
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Non-empty string or number rendered as text.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(value_text)
}

fn text_or(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    text_field(obj, keys).unwrap_or_else(|| default.to_string())
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|f| f.is_finite())
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(as_number)
}

fn percentage(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    number_field(obj, keys).map(|p| p.clamp(0.0, 100.0)).unwrap_or(0.0)
}

/// Each coordinate prefers the nested object and falls back to the top-level
/// field. Both must resolve or the location is absent.
fn extract_location(obj: &Map<String, Value>) -> Option<Location> {
    let nested = ["currentLocation", "location"]
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(Value::as_object);

    let coordinate = |short: &str, long: &str| {
        nested
            .and_then(|n| n.get(short).or_else(|| n.get(long)))
            .and_then(as_number)
            .or_else(|| obj.get(long).and_then(as_number))
    };

    match (coordinate("lat", "latitude"), coordinate("lng", "longitude")) {
        (Some(lat), Some(lng)) => Some(Location { lat, lng }),
        _ => None,
    }
}
