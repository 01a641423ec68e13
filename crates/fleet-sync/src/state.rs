//! # Shared Dashboard State
//!
//! The single state container behind the dashboard, and the update messages
//! that are the only way to change it.
//!
//! ## Update Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Single-Writer State Updates                         │
//! │                                                                         │
//! │  load_all ─────┐                                                        │
//! │  load_by_status┤                                                        │
//! │  load_by_id ───┤   StateUpdate    ┌──────────────┐   Arc<SyncState>     │
//! │  refresh_stats ┼─────(mpsc)──────►│   applier    │──────(watch)──────►  │
//! │  push channel ─┤   arrival order  │ SyncState::  │   one snapshot per   │
//! │  select ───────┘                  │   apply()    │   applied update     │
//! │                                   └──────────────┘                      │
//! │                                                                         │
//! │  SEQUENCE GUARD                                                         │
//! │  ──────────────                                                         │
//! │  Every list request (snapshot, filtered, pushed fleet) carries a        │
//! │  sequence number issued at request time. A list result or list failure  │
//! │  older than the last applied one is discarded.                          │
//! │                                                                         │
//! │    seq 7 (idle) ─────────────────────────────────► arrives last: drop   │
//! │    seq 8 (delivered) ────────► applied                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Phases
//! `Idle → Loading → Ready(Synced | Degraded | Refreshing)`. Previous data is
//! never blanked while a request is in flight or after one fails.

use serde::Serialize;
use tracing::debug;

use fleet_core::query::filter_by_status;
use fleet_core::{
    aggregate, reconcile, FreshnessClock, Statistics, StatisticsPatch, Vehicle, VehicleStatus,
};

/// Error surfaced for any push channel failure.
pub const PUSH_ERROR_MESSAGE: &str = "WebSocket connection error";

// =============================================================================
// Status Enums
// =============================================================================

/// Push channel connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Open => write!(f, "open"),
            ConnectionStatus::Closed => write!(f, "closed"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Sub-state once data has been shown at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// Last list request succeeded.
    Synced,
    /// Last list request failed; stale data retained.
    Degraded,
    /// A list request is in flight; previous data still displayed.
    Refreshing,
}

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "state")]
pub enum Phase {
    Idle,
    Loading,
    Ready(ReadyState),
}

impl Phase {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Phase::Ready(ReadyState::Degraded))
    }
}

// =============================================================================
// State Updates
// =============================================================================

/// Every mutation of [`SyncState`].
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// A list request with this sequence number has been issued.
    ListRequested { seq: u64 },

    /// Full fleet snapshot fetched.
    FleetLoaded { seq: u64, vehicles: Vec<Vehicle> },

    /// Full fleet pushed by the server.
    FleetPushed { seq: u64, vehicles: Vec<Vehicle> },

    /// Filtered list fetched.
    FilteredLoaded {
        seq: u64,
        status: VehicleStatus,
        vehicles: Vec<Vehicle>,
    },

    /// A list request failed.
    ListFailed { seq: u64, error: String },

    /// Authoritative statistics arrived (fetched or pushed).
    StatisticsLoaded(StatisticsPatch),

    /// Entity detail fetched.
    DetailLoaded(Vehicle),

    /// Entity detail fetch failed or found nothing.
    DetailFailed { error: String },

    /// Selection changed by the consumer.
    Selected(Option<Vehicle>),

    /// Push channel changed state.
    Connection(ConnectionStatus),

    /// Push channel reported an error.
    PushFailed,

    /// Initial load finished, success or not.
    InitialLoadComplete,
}

impl StateUpdate {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StateUpdate::ListRequested { .. } => "list_requested",
            StateUpdate::FleetLoaded { .. } => "fleet_loaded",
            StateUpdate::FleetPushed { .. } => "fleet_pushed",
            StateUpdate::FilteredLoaded { .. } => "filtered_loaded",
            StateUpdate::ListFailed { .. } => "list_failed",
            StateUpdate::StatisticsLoaded(_) => "statistics_loaded",
            StateUpdate::DetailLoaded(_) => "detail_loaded",
            StateUpdate::DetailFailed { .. } => "detail_failed",
            StateUpdate::Selected(_) => "selected",
            StateUpdate::Connection(_) => "connection",
            StateUpdate::PushFailed => "push_failed",
            StateUpdate::InitialLoadComplete => "initial_load_complete",
        }
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Everything the render layer reads.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    /// Currently displayed list (fleet or filtered).
    pub vehicles: Vec<Vehicle>,

    /// Reconciled statistics, `None` until the first data arrives.
    pub statistics: Option<Statistics>,

    /// True from startup until the initial load completes.
    pub loading: bool,

    /// Last non-fatal failure.
    pub error: Option<String>,

    pub selected_vehicle: Option<Vehicle>,

    pub connection_status: ConnectionStatus,

    pub phase: Phase,

    /// Status the displayed list is filtered to, if any.
    pub active_filter: Option<VehicleStatus>,

    /// Aggregate of the last full fleet list. Filtered lists never touch it.
    pub fleet_derived: Option<Statistics>,

    /// Last authoritative patch received.
    pub authoritative: Option<StatisticsPatch>,

    /// Highest list sequence applied so far.
    pub applied_list_seq: u64,

    clock: FreshnessClock,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// Startup state: nothing loaded yet, `loading` set.
    pub fn new() -> Self {
        SyncState {
            vehicles: Vec::new(),
            statistics: None,
            loading: true,
            error: None,
            selected_vehicle: None,
            connection_status: ConnectionStatus::Closed,
            phase: Phase::Idle,
            active_filter: None,
            fleet_derived: None,
            authoritative: None,
            applied_list_seq: 0,
            clock: FreshnessClock::new(),
        }
    }

    /// Epoch ms of the last confirmed-fresh instant.
    pub fn last_confirmed_at(&self) -> i64 {
        self.clock.confirmed_at()
    }

    /// Freshness label as of `now_ms`.
    pub fn freshness_label_at(&self, now_ms: i64) -> String {
        self.clock.relative_age_at(now_ms)
    }

    /// Applies one update. Returns false when the update was discarded and
    /// nothing changed.
    pub fn apply(&mut self, update: StateUpdate, now_ms: i64) -> bool {
        match update {
            StateUpdate::ListRequested { seq } => {
                if seq < self.applied_list_seq {
                    return false;
                }
                self.phase = if self.has_data() {
                    Phase::Ready(ReadyState::Refreshing)
                } else {
                    Phase::Loading
                };
            }

            StateUpdate::FleetLoaded { seq, vehicles } => {
                if !self.accept_list(seq, "fleet_loaded") {
                    return false;
                }
                self.active_filter = None;
                self.apply_fleet(vehicles, now_ms);
            }

            StateUpdate::FleetPushed { seq, vehicles } => {
                if !self.accept_list(seq, "fleet_pushed") {
                    return false;
                }
                self.apply_fleet(vehicles, now_ms);
            }

            StateUpdate::FilteredLoaded { seq, status, vehicles } => {
                if !self.accept_list(seq, "filtered_loaded") {
                    return false;
                }
                self.clock.set_confirmed(Some(latest_update(&vehicles).unwrap_or(now_ms)));
                self.vehicles = vehicles;
                self.active_filter = Some(status);
                self.error = None;
                self.phase = Phase::Ready(ReadyState::Synced);
            }

            StateUpdate::ListFailed { seq, error } => {
                if !self.accept_list(seq, "list_failed") {
                    return false;
                }
                self.error = Some(error);
                self.phase = Phase::Ready(ReadyState::Degraded);
                self.clock.set_confirmed(Some(now_ms));
            }

            StateUpdate::StatisticsLoaded(patch) => {
                let derived = self.fleet_derived.unwrap_or_default();
                self.statistics = Some(reconcile(&derived, Some(&patch)));
                if let Some(server_time) = patch.server_time_ms {
                    self.clock.set_confirmed(Some(server_time));
                }
                self.authoritative = Some(patch);
            }

            StateUpdate::DetailLoaded(vehicle) => {
                self.selected_vehicle = Some(vehicle);
            }

            StateUpdate::DetailFailed { error } => {
                self.error = Some(error);
            }

            StateUpdate::Selected(vehicle) => {
                self.selected_vehicle = vehicle;
            }

            StateUpdate::Connection(status) => {
                self.connection_status = status;
                if status == ConnectionStatus::Open {
                    self.error = None;
                }
            }

            StateUpdate::PushFailed => {
                self.error = Some(PUSH_ERROR_MESSAGE.to_string());
            }

            StateUpdate::InitialLoadComplete => {
                self.loading = false;
            }
        }
        true
    }

    fn has_data(&self) -> bool {
        !matches!(self.phase, Phase::Idle | Phase::Loading)
    }

    /// Sequence guard shared by every list result and list failure.
    fn accept_list(&mut self, seq: u64, kind: &str) -> bool {
        if seq < self.applied_list_seq {
            debug!(
                seq,
                applied = self.applied_list_seq,
                kind,
                "Discarding out-of-order list response"
            );
            return false;
        }
        self.applied_list_seq = seq;
        true
    }

    /// Shared path for fetched and pushed full-fleet lists.
    fn apply_fleet(&mut self, vehicles: Vec<Vehicle>, now_ms: i64) {
        let derived = aggregate(&vehicles);
        self.statistics = Some(reconcile(&derived, self.authoritative.as_ref()));
        self.fleet_derived = Some(derived);
        self.clock.set_confirmed(Some(latest_update(&vehicles).unwrap_or(now_ms)));

        self.vehicles = match &self.active_filter {
            Some(status) => filter_by_status(&vehicles, status),
            None => vehicles,
        };
        self.error = None;
        self.phase = Phase::Ready(ReadyState::Synced);
    }
}

/// Latest per-vehicle server timestamp.
fn latest_update(vehicles: &[Vehicle]) -> Option<i64> {
    vehicles.iter().filter_map(|v| v.last_updated_at).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::normalize;
    use serde_json::json;

    const NOW: i64 = 1_705_314_600_000;

    fn vehicle(id: &str, status: &str) -> Vehicle {
        normalize(&json!({ "id": id, "status": status, "speed": 30 })).unwrap()
    }

    fn fleet(n: usize) -> Vec<Vehicle> {
        (0..n)
            .map(|i| vehicle(&format!("TRK-{i}"), if i % 2 == 0 { "idle" } else { "moving" }))
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let state = SyncState::new();
        assert!(state.loading);
        assert!(state.vehicles.is_empty());
        assert_eq!(state.statistics, None);
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn test_list_requested_phase() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::ListRequested { seq: 1 }, NOW);
        assert_eq!(state.phase, Phase::Loading);

        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(4) }, NOW);
        assert_eq!(state.phase, Phase::Ready(ReadyState::Synced));

        state.apply(StateUpdate::ListRequested { seq: 2 }, NOW);
        assert_eq!(state.phase, Phase::Ready(ReadyState::Refreshing));
        assert_eq!(state.vehicles.len(), 4);
    }

    #[test]
    fn test_fleet_loaded_sets_derived_statistics() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(4) }, NOW);
        let stats = state.statistics.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.en_route, 2);
        assert_eq!(state.last_confirmed_at(), NOW);
    }

    #[test]
    fn test_failure_keeps_stale_data() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(10) }, NOW);
        state.apply(StateUpdate::ListRequested { seq: 2 }, NOW);
        state.apply(StateUpdate::ListFailed { seq: 2, error: "boom".into() }, NOW + 5_000);

        assert_eq!(state.vehicles.len(), 10);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(state.phase.is_degraded());
        assert_eq!(state.last_confirmed_at(), NOW + 5_000);
    }

    #[test]
    fn test_filtered_list_leaves_statistics() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(6) }, NOW);
        let before = state.statistics;

        let idle: Vec<Vehicle> = fleet(6).into_iter().filter(|v| v.status == VehicleStatus::Idle).collect();
        state.apply(
            StateUpdate::FilteredLoaded { seq: 2, status: VehicleStatus::Idle, vehicles: idle },
            NOW,
        );

        assert_eq!(state.vehicles.len(), 3);
        assert_eq!(state.statistics, before);
        assert_eq!(state.active_filter, Some(VehicleStatus::Idle));
    }

    #[test]
    fn test_stale_list_response_discarded() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::ListRequested { seq: 1 }, NOW);
        state.apply(StateUpdate::ListRequested { seq: 2 }, NOW);

        let delivered = vec![vehicle("D-1", "delivered")];
        assert!(state.apply(
            StateUpdate::FilteredLoaded { seq: 2, status: VehicleStatus::Delivered, vehicles: delivered },
            NOW,
        ));
        assert!(!state.apply(
            StateUpdate::FilteredLoaded { seq: 1, status: VehicleStatus::Idle, vehicles: fleet(4) },
            NOW,
        ));
        assert!(!state.apply(StateUpdate::ListFailed { seq: 1, error: "late".into() }, NOW));

        assert_eq!(state.vehicles.len(), 1);
        assert_eq!(state.active_filter, Some(VehicleStatus::Delivered));
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_pushed_fleet_respects_active_filter() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(2) }, NOW);
        state.apply(
            StateUpdate::FilteredLoaded { seq: 2, status: VehicleStatus::EnRoute, vehicles: vec![] },
            NOW,
        );
        state.apply(StateUpdate::FleetPushed { seq: 3, vehicles: fleet(8) }, NOW);

        assert_eq!(state.vehicles.len(), 4);
        assert!(state.vehicles.iter().all(|v| v.status == VehicleStatus::EnRoute));
        assert_eq!(state.statistics.unwrap().total, 8);
        assert_eq!(state.active_filter, Some(VehicleStatus::EnRoute));
    }

    #[test]
    fn test_load_all_clears_filter() {
        let mut state = SyncState::new();
        state.apply(
            StateUpdate::FilteredLoaded { seq: 1, status: VehicleStatus::Idle, vehicles: vec![] },
            NOW,
        );
        state.apply(StateUpdate::FleetLoaded { seq: 2, vehicles: fleet(3) }, NOW);
        assert_eq!(state.active_filter, None);
        assert_eq!(state.vehicles.len(), 3);
    }

    #[test]
    fn test_statistics_reconcile_against_fleet() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(4) }, NOW);
        let patch = StatisticsPatch {
            total: Some(40),
            average_speed: Some(0.0),
            ..Default::default()
        };
        state.apply(StateUpdate::StatisticsLoaded(patch), NOW);

        let stats = state.statistics.unwrap();
        assert_eq!(stats.total, 40);
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.average_speed, 0.0);

        // The patch keeps winning on later fleet lists
        state.apply(StateUpdate::FleetLoaded { seq: 2, vehicles: fleet(2) }, NOW);
        assert_eq!(state.statistics.unwrap().total, 40);
        assert_eq!(state.statistics.unwrap().idle, 1);
    }

    #[test]
    fn test_statistics_clock_only_with_server_time() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles: fleet(1) }, NOW);

        state.apply(StateUpdate::StatisticsLoaded(StatisticsPatch::default()), NOW + 9_000);
        assert_eq!(state.last_confirmed_at(), NOW);

        let patch = StatisticsPatch { server_time_ms: Some(NOW + 2_000), ..Default::default() };
        state.apply(StateUpdate::StatisticsLoaded(patch), NOW + 9_000);
        assert_eq!(state.last_confirmed_at(), NOW + 2_000);
    }

    #[test]
    fn test_clock_uses_latest_vehicle_timestamp() {
        let mut state = SyncState::new();
        let vehicles = vec![
            normalize(&json!({ "id": "a", "lastUpdated": "2024-01-15T10:00:00Z" })).unwrap(),
            normalize(&json!({ "id": "b", "lastUpdated": "2024-01-15T10:30:00Z" })).unwrap(),
            normalize(&json!({ "id": "c" })).unwrap(),
        ];
        state.apply(StateUpdate::FleetLoaded { seq: 1, vehicles }, NOW + 60_000);
        assert_eq!(state.last_confirmed_at(), NOW);
    }

    #[test]
    fn test_connection_open_clears_error() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::PushFailed, NOW);
        assert_eq!(state.error.as_deref(), Some(PUSH_ERROR_MESSAGE));

        state.apply(StateUpdate::Connection(ConnectionStatus::Reconnecting), NOW);
        assert!(state.error.is_some());

        state.apply(StateUpdate::Connection(ConnectionStatus::Open), NOW);
        assert_eq!(state.error, None);
        assert_eq!(state.connection_status, ConnectionStatus::Open);
    }

    #[test]
    fn test_selection() {
        let mut state = SyncState::new();
        state.apply(StateUpdate::DetailLoaded(vehicle("TRK-9", "idle")), NOW);
        assert_eq!(state.selected_vehicle.as_ref().unwrap().id, "TRK-9");

        state.apply(StateUpdate::DetailFailed { error: "gone".into() }, NOW);
        assert_eq!(state.selected_vehicle.as_ref().unwrap().id, "TRK-9");

        state.apply(StateUpdate::Selected(None), NOW);
        assert!(state.selected_vehicle.is_none());
    }
}
