//! # fleet-core: Pure View-Model Logic for the Fleet Dashboard
//!
//! This crate turns raw backend payloads into the stable view model the
//! dashboard renders. Everything here is a pure function with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Fleet Dashboard Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Render Layer (external)                      │   │
//! │  │    Stat cards ──► Filter bar ──► Vehicle table ──► Detail modal │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ subscribe / read                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            fleet-sync (engine, REST client, push channel)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fleet-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  vehicle  │  │ statistics │  │ freshness │  │   query   │  │   │
//! │  │   │ normalize │  │ aggregate  │  │  labels   │  │  search   │  │   │
//! │  │   │  status   │  │ reconcile  │  │  clock    │  │  sort     │  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`vehicle`] - Canonical `Vehicle` and the normalizer
//! - [`statistics`] - Aggregation and derived/authoritative reconciliation
//! - [`freshness`] - "Last updated" clock and labels
//! - [`payload`] - Envelope-tolerant response extraction
//! - [`query`] - Client-side search, filter and sort
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use fleet_core::{aggregate, normalize_all, reconcile};
//! use serde_json::json;
//!
//! let raw = vec![
//!     json!({ "id": "TRK-1", "status": "moving", "speed": 48 }),
//!     json!({ "id": "TRK-2", "status": "idle" }),
//!     json!({ "driverName": "no id, dropped" }),
//! ];
//!
//! let vehicles = normalize_all(&raw);
//! let stats = reconcile(&aggregate(&vehicles), None);
//!
//! assert_eq!(stats.total, 2);
//! assert_eq!(stats.en_route, 1);
//! assert_eq!(stats.average_speed, 48.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod freshness;
pub mod payload;
pub mod query;
pub mod statistics;
pub mod vehicle;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use freshness::{relative_age, FreshnessClock};
pub use query::{SortDirection, SortKey, VehicleQuery};
pub use statistics::{aggregate, reconcile, FleetSummary, Statistics, StatisticsPatch};
pub use vehicle::{normalize, normalize_all, Location, Vehicle, VehicleStatus};
