//! # Statistics Aggregator
//!
//! Derives fleet counts and averages from a vehicle collection, and
//! reconciles them with server-supplied aggregates.
//!
//! ## Precedence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  derived ⊕ authoritative → statistics                   │
//! │                                                                         │
//! │  field          authoritative present?   result                         │
//! │  ─────────────  ───────────────────────  ─────────────────────────────  │
//! │  total          yes                      authoritative                  │
//! │  idle ...       no                       derived                        │
//! │  averageSpeed   yes (even 0.0)           authoritative                  │
//! │                 no                       derived                        │
//! │                                                                         │
//! │  authoritative = None  →  derived unchanged                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Present" means the key existed with a usable value. A legitimate `0` from
//! the server is present and wins over a non-zero derived value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::payload::unwrap_data_envelope;
use crate::vehicle::{parse_timestamp, Vehicle, VehicleStatus};

// =============================================================================
// Statistics
// =============================================================================

/// Fleet aggregate metrics.
///
/// `idle + en_route + delivered + maintenance <= total`; the gap is vehicles
/// whose status is not one of the four known ones.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Statistics {
    pub total: u32,
    pub idle: u32,
    pub en_route: u32,
    pub delivered: u32,
    pub maintenance: u32,
    /// Mean of `speed` over vehicles moving faster than 0; 0 if none are.
    pub average_speed: f64,
}

impl Statistics {
    /// Count for one status bucket. Unknown statuses have no bucket.
    pub fn count_for(&self, status: &VehicleStatus) -> u32 {
        match status {
            VehicleStatus::Idle => self.idle,
            VehicleStatus::EnRoute => self.en_route,
            VehicleStatus::Delivered => self.delivered,
            VehicleStatus::Maintenance => self.maintenance,
            VehicleStatus::Other(_) => 0,
        }
    }

    /// Sum of the four known status buckets.
    pub fn classified(&self) -> u32 {
        self.idle
            .saturating_add(self.en_route)
            .saturating_add(self.delivered)
            .saturating_add(self.maintenance)
    }

    /// Full patch carrying every field of `self`.
    pub fn to_patch(&self) -> StatisticsPatch {
        StatisticsPatch {
            total: Some(self.total),
            idle: Some(self.idle),
            en_route: Some(self.en_route),
            delivered: Some(self.delivered),
            maintenance: Some(self.maintenance),
            average_speed: Some(self.average_speed),
            server_time_ms: None,
        }
    }

    /// Secondary figures shown under the fleet stats panel.
    pub fn summary(&self) -> FleetSummary {
        FleetSummary {
            active_routes: self.en_route.saturating_add(self.idle),
            completed: self.delivered,
        }
    }
}

/// Derived "at a glance" figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FleetSummary {
    /// Vehicles still on a route: moving plus idle.
    pub active_routes: u32,
    pub completed: u32,
}

// =============================================================================
// Authoritative Patch
// =============================================================================

/// Statistics as received from the backend. Every field may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatisticsPatch {
    pub total: Option<u32>,
    pub idle: Option<u32>,
    pub en_route: Option<u32>,
    pub delivered: Option<u32>,
    pub maintenance: Option<u32>,
    pub average_speed: Option<f64>,
    /// Server-reported time of the aggregate, epoch ms.
    pub server_time_ms: Option<i64>,
}

impl StatisticsPatch {
    /// Parses a statistics payload, bare or enveloped under `data`.
    ///
    /// Backend variants disagree on key names, so each field accepts the
    /// spellings seen in the wild (`total`/`totalVehicles`,
    /// `enRoute`/`en_route`/`moving`, `averageSpeed`/`average_speed`/`avgSpeed`).
    pub fn from_value(raw: &Value) -> CoreResult<Self> {
        let obj = unwrap_data_envelope(raw)
            .as_object()
            .ok_or_else(|| CoreError::InvalidPayload("statistics must be an object".into()))?;

        Ok(StatisticsPatch {
            total: count(obj, &["total", "totalVehicles"]),
            idle: count(obj, &["idle"]),
            en_route: count(obj, &["enRoute", "en_route", "moving"]),
            delivered: count(obj, &["delivered"]),
            maintenance: count(obj, &["maintenance"]),
            average_speed: ["averageSpeed", "average_speed", "avgSpeed"]
                .iter()
                .filter_map(|k| obj.get(*k))
                .find_map(Value::as_f64)
                .filter(|s| s.is_finite() && *s >= 0.0),
            server_time_ms: ["timestamp", "lastUpdated"]
                .iter()
                .filter_map(|k| obj.get(*k))
                .find_map(parse_timestamp),
        })
    }

    /// True when no statistic field is present.
    pub fn is_empty(&self) -> bool {
        self.total.is_none()
            && self.idle.is_none()
            && self.en_route.is_none()
            && self.delivered.is_none()
            && self.maintenance.is_none()
            && self.average_speed.is_none()
    }
}

fn count(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
        })
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

// =============================================================================
// Aggregation
// =============================================================================

/// Computes derived statistics in a single pass.
pub fn aggregate(vehicles: &[Vehicle]) -> Statistics {
    let mut stats = Statistics {
        total: u32::try_from(vehicles.len()).unwrap_or(u32::MAX),
        ..Default::default()
    };
    let mut speed_sum = 0.0;
    let mut moving = 0u32;

    for vehicle in vehicles {
        match vehicle.status {
            VehicleStatus::Idle => stats.idle += 1,
            VehicleStatus::EnRoute => stats.en_route += 1,
            VehicleStatus::Delivered => stats.delivered += 1,
            VehicleStatus::Maintenance => stats.maintenance += 1,
            VehicleStatus::Other(_) => {}
        }
        if vehicle.speed > 0.0 {
            speed_sum += vehicle.speed;
            moving += 1;
        }
    }

    if moving > 0 {
        stats.average_speed = speed_sum / f64::from(moving);
    }
    stats
}

/// Merges derived statistics with the authoritative patch, if any.
///
/// ## Example
/// ```rust
/// use fleet_core::statistics::{reconcile, Statistics, StatisticsPatch};
///
/// let derived = Statistics { total: 10, idle: 4, average_speed: 31.5, ..Default::default() };
/// let patch = StatisticsPatch { total: Some(12), average_speed: Some(0.0), ..Default::default() };
///
/// let merged = reconcile(&derived, Some(&patch));
/// assert_eq!(merged.total, 12);         // authoritative
/// assert_eq!(merged.idle, 4);           // derived, patch had none
/// assert_eq!(merged.average_speed, 0.0); // authoritative 0 still wins
/// ```
pub fn reconcile(derived: &Statistics, authoritative: Option<&StatisticsPatch>) -> Statistics {
    let Some(patch) = authoritative else {
        return *derived;
    };

    Statistics {
        total: patch.total.unwrap_or(derived.total),
        idle: patch.idle.unwrap_or(derived.idle),
        en_route: patch.en_route.unwrap_or(derived.en_route),
        delivered: patch.delivered.unwrap_or(derived.delivered),
        maintenance: patch.maintenance.unwrap_or(derived.maintenance),
        average_speed: patch.average_speed.unwrap_or(derived.average_speed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::normalize;
    use serde_json::json;

    fn vehicle(id: &str, status: &str, speed: f64) -> Vehicle {
        normalize(&json!({ "id": id, "status": status, "speed": speed })).unwrap()
    }

    #[test]
    fn test_aggregate_counts_and_average() {
        let fleet = vec![
            vehicle("a", "idle", 0.0),
            vehicle("b", "moving", 40.0),
            vehicle("c", "en_route", 60.0),
            vehicle("d", "delivered", 0.0),
            vehicle("e", "maintenance", 0.0),
            vehicle("f", "parked", 20.0),
        ];
        let stats = aggregate(&fleet);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.en_route, 2);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.maintenance, 1);
        assert!(stats.classified() < stats.total);
        assert_eq!(stats.average_speed, 40.0);
    }

    #[test]
    fn test_aggregate_no_moving_vehicles() {
        let fleet = vec![vehicle("a", "idle", 0.0), vehicle("b", "delivered", 0.0)];
        let stats = aggregate(&fleet);
        assert_eq!(stats.average_speed, 0.0);
        assert!(stats.classified() <= stats.total);

        assert_eq!(aggregate(&[]), Statistics::default());
    }

    #[test]
    fn test_reconcile_without_authority() {
        let derived = aggregate(&[vehicle("a", "idle", 12.0)]);
        assert_eq!(reconcile(&derived, None), derived);
        assert_eq!(reconcile(&derived, Some(&StatisticsPatch::default())), derived);
    }

    #[test]
    fn test_reconcile_prefers_authoritative_counts() {
        let derived = Statistics {
            total: 3,
            idle: 1,
            en_route: 1,
            delivered: 1,
            maintenance: 0,
            average_speed: 25.0,
        };
        let patch = StatisticsPatch {
            total: Some(50),
            en_route: Some(30),
            ..Default::default()
        };
        let merged = reconcile(&derived, Some(&patch));
        assert_eq!(merged.total, 50);
        assert_eq!(merged.en_route, 30);
        assert_eq!(merged.idle, 1);
        assert_eq!(merged.average_speed, 25.0);
    }

    #[test]
    fn test_reconcile_authoritative_zero_speed_wins() {
        let derived = Statistics { average_speed: 42.0, ..Default::default() };
        let patch = StatisticsPatch { average_speed: Some(0.0), ..Default::default() };
        assert_eq!(reconcile(&derived, Some(&patch)).average_speed, 0.0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let stats = Statistics {
            total: 9,
            idle: 2,
            en_route: 3,
            delivered: 2,
            maintenance: 1,
            average_speed: 33.3,
        };
        let once = reconcile(&stats, Some(&stats.to_patch()));
        assert_eq!(once, stats);
        assert_eq!(reconcile(&once, Some(&once.to_patch())), once);
    }

    #[test]
    fn test_patch_parsing_aliases_and_envelope() {
        let patch = StatisticsPatch::from_value(&json!({
            "data": {
                "totalVehicles": 20,
                "moving": 8,
                "idle": 5,
                "avgSpeed": 37.5,
                "timestamp": "2024-01-15T10:30:00Z"
            }
        }))
        .unwrap();
        assert_eq!(patch.total, Some(20));
        assert_eq!(patch.en_route, Some(8));
        assert_eq!(patch.idle, Some(5));
        assert_eq!(patch.delivered, None);
        assert_eq!(patch.average_speed, Some(37.5));
        assert_eq!(patch.server_time_ms, Some(1_705_314_600_000));
    }

    #[test]
    fn test_patch_parsing_rejects_non_object() {
        assert!(StatisticsPatch::from_value(&json!([1, 2])).is_err());
        assert!(StatisticsPatch::from_value(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_summary() {
        let stats = Statistics { idle: 2, en_route: 5, delivered: 7, ..Default::default() };
        assert_eq!(stats.summary(), FleetSummary { active_routes: 7, completed: 7 });
        assert_eq!(stats.count_for(&VehicleStatus::EnRoute), 5);
        assert_eq!(stats.count_for(&VehicleStatus::Other("x".into())), 0);
    }

    #[test]
    fn test_summary_saturates_huge_authoritative_counts() {
        let patch = StatisticsPatch::from_value(&json!({
            "idle": 4_294_967_295u64,
            "enRoute": 1,
            "delivered": 99_999_999_999u64
        }))
        .unwrap();
        assert_eq!(patch.delivered, Some(u32::MAX));

        let stats = reconcile(&Statistics::default(), Some(&patch));
        assert_eq!(stats.summary().active_routes, u32::MAX);
        assert_eq!(stats.summary().completed, u32::MAX);
        assert_eq!(stats.classified(), u32::MAX);
    }
}
