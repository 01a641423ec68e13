//! # View Queries
//!
//! Client-side search, status filtering and sorting over the vehicle list.
//!
//! The filtered endpoint already narrows the list server-side, but a pushed
//! full-fleet update arrives unfiltered, so the engine re-applies the active
//! status filter locally. Search and sort are pure conveniences for the
//! render layer.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::vehicle::{Vehicle, VehicleStatus};

/// Column a list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Id,
    DriverName,
    Status,
    Destination,
    Speed,
    BatteryLevel,
    FuelLevel,
    LastUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Clicking the active column flips direction; a new column starts ascending.
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// A combined search / filter / sort request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleQuery {
    /// Case-insensitive substring matched against id, driver, destination,
    /// status and location text.
    pub search: Option<String>,
    pub status: Option<VehicleStatus>,
    pub sort: Option<(SortKey, SortDirection)>,
}

impl VehicleQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn sorted_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some((key, direction));
        self
    }

    /// Runs the query, returning a new list.
    pub fn apply(&self, vehicles: &[Vehicle]) -> Vec<Vehicle> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut out: Vec<Vehicle> = vehicles
            .iter()
            .filter(|v| self.status.as_ref().map_or(true, |s| &v.status == s))
            .filter(|v| needle.as_deref().map_or(true, |n| matches_search(v, n)))
            .cloned()
            .collect();

        if let Some((key, direction)) = self.sort {
            out.sort_by(|a, b| compare(a, b, key, direction));
        }
        out
    }
}

/// Keeps only vehicles in `status`.
pub fn filter_by_status(vehicles: &[Vehicle], status: &VehicleStatus) -> Vec<Vehicle> {
    vehicles.iter().filter(|v| &v.status == status).cloned().collect()
}

/// `needle` must already be lower-cased.
fn matches_search(vehicle: &Vehicle, needle: &str) -> bool {
    [
        vehicle.id.as_str(),
        vehicle.driver_name.as_str(),
        vehicle.destination.as_str(),
        vehicle.status.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
        || vehicle.location_text().to_lowercase().contains(needle)
}

fn compare(a: &Vehicle, b: &Vehicle, key: SortKey, direction: SortDirection) -> Ordering {
    // Missing timestamps always sink to the bottom, whatever the direction.
    if key == SortKey::LastUpdated {
        return match (a.last_updated_at, b.last_updated_at) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => directed(x.cmp(&y), direction),
        };
    }

    let ordering = match key {
        SortKey::Id => text_cmp(&a.id, &b.id),
        SortKey::DriverName => text_cmp(&a.driver_name, &b.driver_name),
        SortKey::Status => text_cmp(a.status.as_str(), b.status.as_str()),
        SortKey::Destination => text_cmp(&a.destination, &b.destination),
        SortKey::Speed => a.speed.total_cmp(&b.speed),
        SortKey::BatteryLevel => a.battery_level.total_cmp(&b.battery_level),
        SortKey::FuelLevel => a.fuel_level.total_cmp(&b.fuel_level),
        SortKey::LastUpdated => Ordering::Equal,
    };
    directed(ordering, direction)
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn text_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::normalize;
    use serde_json::json;

    fn fleet() -> Vec<Vehicle> {
        [
            json!({ "id": "TRK-2", "driverName": "Maria Lopez", "status": "idle", "speed": 0,
                    "destination": "Boston", "lastUpdated": "2024-01-15T10:00:00Z" }),
            json!({ "id": "TRK-1", "driverName": "ann Chu", "status": "moving", "speed": 55,
                    "destination": "Albany" }),
            json!({ "id": "TRK-3", "driverName": "Zed", "status": "delivered", "speed": 10,
                    "destination": "Chicago", "lastUpdated": "2024-01-15T11:00:00Z",
                    "latitude": 41.8781, "longitude": -87.6298 }),
        ]
        .iter()
        .map(|raw| normalize(raw).unwrap())
        .collect()
    }

    fn ids(list: &[Vehicle]) -> Vec<&str> {
        list.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let all = fleet();
        assert_eq!(ids(&VehicleQuery::new().with_search("MARIA").apply(&all)), ["TRK-2"]);
        assert_eq!(ids(&VehicleQuery::new().with_search("albany").apply(&all)), ["TRK-1"]);
        assert_eq!(ids(&VehicleQuery::new().with_search("en_route").apply(&all)), ["TRK-1"]);
        assert_eq!(ids(&VehicleQuery::new().with_search("41.878").apply(&all)), ["TRK-3"]);
        assert_eq!(VehicleQuery::new().with_search("   ").apply(&all).len(), 3);
    }

    #[test]
    fn test_status_filter() {
        let all = fleet();
        assert_eq!(ids(&filter_by_status(&all, &VehicleStatus::EnRoute)), ["TRK-1"]);
        let q = VehicleQuery::new().with_status(VehicleStatus::Maintenance);
        assert!(q.apply(&all).is_empty());
    }

    #[test]
    fn test_sorting() {
        let all = fleet();
        let by_id = VehicleQuery::new().sorted_by(SortKey::Id, SortDirection::Asc).apply(&all);
        assert_eq!(ids(&by_id), ["TRK-1", "TRK-2", "TRK-3"]);

        let by_driver = VehicleQuery::new()
            .sorted_by(SortKey::DriverName, SortDirection::Asc)
            .apply(&all);
        assert_eq!(ids(&by_driver), ["TRK-1", "TRK-2", "TRK-3"]);

        let by_speed = VehicleQuery::new()
            .sorted_by(SortKey::Speed, SortDirection::Desc)
            .apply(&all);
        assert_eq!(ids(&by_speed), ["TRK-1", "TRK-3", "TRK-2"]);
    }

    #[test]
    fn test_missing_timestamps_sort_last() {
        let all = fleet();
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let sorted = VehicleQuery::new()
                .sorted_by(SortKey::LastUpdated, direction)
                .apply(&all);
            assert_eq!(sorted.last().unwrap().id, "TRK-1");
        }
        assert_eq!(SortDirection::Asc.toggled(), SortDirection::Desc);
    }
}
