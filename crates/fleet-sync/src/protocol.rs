//! # Push Protocol Messages
//!
//! Message shape received over the push channel.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Push Channel Text Frames                           │
//! │                                                                         │
//! │  { "vehicles": [ {...}, {...} ] }              full fleet, bare array   │
//! │  { "vehicles": { "data": [ ... ] } }           full fleet, enveloped    │
//! │  { "statistics": { "total": 12, ... } }        authoritative patch      │
//! │  { "vehicles": [...], "statistics": {...} }    both, applied in order   │
//! │                                                                         │
//! │  Anything else (non-JSON, arrays, scalars) is dropped with a warning.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both parts are kept as raw JSON here; normalization happens in the
//! engine's ingest path so pushed data and fetched data share one pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// One decoded push frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Full fleet update. Array, or an object wrapping the array under
    /// `data` / `vehicles`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicles: Option<Value>,

    /// Authoritative statistics patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
}

impl PushMessage {
    /// Message carrying a vehicle list.
    pub fn vehicles(vehicles: Value) -> Self {
        PushMessage {
            vehicles: Some(vehicles),
            statistics: None,
        }
    }

    /// Message carrying a statistics patch.
    pub fn statistics(statistics: Value) -> Self {
        PushMessage {
            vehicles: None,
            statistics: Some(statistics),
        }
    }

    /// Parses a text frame. The frame must be a JSON object.
    pub fn from_json(text: &str) -> SyncResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(SyncError::InvalidPayload(
                "push message is not a JSON object".into(),
            ));
        }
        let mut message: PushMessage = serde_json::from_value(value)?;

        // `null` counts as absent
        message.vehicles = message.vehicles.filter(|v| !v.is_null());
        message.statistics = message.statistics.filter(|v| !v.is_null());
        Ok(message)
    }

    /// Serializes to a JSON text frame.
    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string(self).map_err(|e| SyncError::SerializationFailed(e.to_string()))
    }

    /// True when the frame carries neither part.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_none() && self.statistics.is_none()
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match (&self.vehicles, &self.statistics) {
            (Some(_), Some(_)) => "vehicles+statistics",
            (Some(_), None) => "vehicles",
            (None, Some(_)) => "statistics",
            (None, None) => "empty",
        }
    }
}
