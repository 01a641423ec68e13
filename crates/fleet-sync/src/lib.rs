//! # fleet-sync: Sync Engine for the Fleet Dashboard
//!
//! Keeps a live, consistent view of the fleet by combining REST snapshots,
//! filtered lists, per-vehicle detail and a WebSocket push channel.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    SyncEngine (Main Orchestrator)                │  │
//! │  │                                                                  │  │
//! │  │  load_all • load_by_status • load_by_id • refresh_statistics     │  │
//! │  │  ingest_push • select • clear_selection                          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  HttpBackend   │  │  PushChannel   │  │  Applier + Ticker      │    │
//! │  │                │  │                │  │                        │    │
//! │  │ reqwest client │  │ WebSocket with │  │ Single writer of       │    │
//! │  │ for the REST   │  │ fixed-delay    │  │ SyncState; 1s label    │    │
//! │  │ endpoints      │  │ reconnect      │  │ refresh                │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  READ SIDE (to the render layer):                                      │
//! │  • subscribe()           - watch<Arc<SyncState>>                       │
//! │  • subscribe_freshness() - watch<String>                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - `FleetBackend` trait and the REST client
//! - [`clock`] - Freshness label ticker
//! - [`config`] - Configuration (TOML + environment)
//! - [`engine`] - `SyncEngine` orchestrator and update queue
//! - [`error`] - Sync error types
//! - [`protocol`] - Push message shape
//! - [`push`] - WebSocket push channel
//! - [`state`] - `SyncState` and its update messages
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_sync::{FleetConfig, SyncEngine};
//!
//! let config = FleetConfig::load_or_default(None);
//! let engine = SyncEngine::from_config(config)?;
//! engine.start().await?;
//!
//! engine.load_by_status("moving").await?;
//! println!("{} en route, updated {}", engine.vehicles().len(), engine.freshness_label());
//!
//! engine.shutdown().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod push;
pub mod state;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{FleetBackend, HttpBackend};
pub use config::FleetConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use protocol::PushMessage;
pub use state::{ConnectionStatus, Phase, ReadyState, StateUpdate, SyncState};
