//! # Payload Envelopes
//!
//! The backend is inconsistent about wrapping: the same endpoint may answer
//! with a bare array, `{ "data": [...] }` or `{ "vehicles": [...] }`. These
//! helpers find the interesting part of a response without caring which.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Returns the `data` object when `raw` is an envelope, `raw` otherwise.
pub fn unwrap_data_envelope(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => raw,
    }
}

/// Locates the vehicle array in a list response.
///
/// ## Accepted Shapes
/// ```text
/// [ {...}, {...} ]
/// { "data": [ ... ] }
/// { "vehicles": [ ... ] }
/// { "data": { "vehicles": [ ... ] } }
/// ```
pub fn vehicle_array(raw: &Value) -> CoreResult<&[Value]> {
    if let Some(list) = raw.as_array() {
        return Ok(list);
    }
    if raw.is_object() {
        for key in ["data", "vehicles"] {
            match raw.get(key) {
                Some(Value::Array(list)) => return Ok(list),
                Some(inner @ Value::Object(_)) => {
                    if let Some(Value::Array(list)) = inner.get("vehicles") {
                        return Ok(list);
                    }
                }
                _ => {}
            }
        }
    }
    Err(CoreError::InvalidPayload(
        "expected a vehicle array or an envelope with `data`/`vehicles`".into(),
    ))
}

/// Locates the vehicle object in a single-entity response.
///
/// Accepts a bare object, `{ "data": {...} }` or `{ "vehicle": {...} }`.
pub fn vehicle_object(raw: &Value) -> CoreResult<&Value> {
    if !raw.is_object() {
        return Err(CoreError::InvalidPayload("expected a vehicle object".into()));
    }
    for key in ["data", "vehicle"] {
        if let Some(inner @ Value::Object(_)) = raw.get(key) {
            return Ok(inner);
        }
    }
    Ok(raw)
}
