//! # Sync Engine
//!
//! Main orchestrator. Owns the update queue, the applier task that holds the
//! only mutable copy of [`SyncState`], the freshness ticker and the push
//! channel.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncEngine Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                          SyncEngine                              │  │
//! │  │                                                                  │  │
//! │  │  • Issues list sequence numbers at request time                  │  │
//! │  │  • Fetches through FleetBackend (concurrently)                   │  │
//! │  │  • Submits StateUpdates, awaiting each one's application         │  │
//! │  │  • Read API over the latest published snapshot                   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ UpdateSink (mpsc)                       │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │    Applier     │  │  PushChannel   │  │   FreshnessTicker      │    │
//! │  │                │  │                │  │                        │    │
//! │  │ SyncState::    │  │ Feeds pushed   │  │ Reads snapshots,       │    │
//! │  │ apply() in     │  │ frames through │  │ publishes the label    │    │
//! │  │ arrival order  │  │ ingest_push    │  │ once per tick          │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  STARTUP: load_all ∥ refresh_statistics → loading=false → push channel │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fleet_core::freshness::now_millis;
use fleet_core::payload::vehicle_array;
use fleet_core::{normalize_all, Statistics, StatisticsPatch, Vehicle, VehicleQuery, VehicleStatus};

use crate::api::{FleetBackend, HttpBackend};
use crate::clock::{FreshnessTicker, TickerHandle};
use crate::config::FleetConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::PushMessage;
use crate::push::{PushChannel, PushConfig, PushHandle};
use crate::state::{ConnectionStatus, Phase, StateUpdate, SyncState};

// =============================================================================
// Update Queue
// =============================================================================

struct Envelope {
    update: StateUpdate,
    ack: oneshot::Sender<()>,
}

/// Write side of the update queue. The only path into [`SyncState`].
#[derive(Clone)]
pub(crate) struct UpdateSink {
    tx: mpsc::Sender<Envelope>,
    list_seq: Arc<AtomicU64>,
}

impl UpdateSink {
    /// Issues the next list sequence number.
    pub(crate) fn next_list_seq(&self) -> u64 {
        self.list_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Enqueues `update` and waits until the applier has processed it.
    pub(crate) async fn submit(&self, update: StateUpdate) -> SyncResult<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Envelope { update, ack })
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        done.await.map_err(|_| SyncError::ShuttingDown)
    }

    /// Routes a push frame through the same paths as fetched data.
    pub(crate) async fn ingest_push(&self, message: PushMessage) -> SyncResult<()> {
        debug!(kind = message.kind(), "Ingesting push message");

        if let Some(raw) = &message.vehicles {
            match vehicle_array(raw) {
                Ok(items) => {
                    let vehicles = normalize_all(items);
                    let seq = self.next_list_seq();
                    debug!(seq, count = vehicles.len(), "Pushed fleet update");
                    self.submit(StateUpdate::FleetPushed { seq, vehicles }).await?;
                }
                Err(e) => warn!(error = %e, "Dropping pushed vehicle list"),
            }
        }

        if let Some(raw) = &message.statistics {
            match StatisticsPatch::from_value(raw) {
                Ok(patch) => self.submit(StateUpdate::StatisticsLoaded(patch)).await?,
                Err(e) => warn!(error = %e, "Dropping pushed statistics"),
            }
        }

        Ok(())
    }
}

/// Owns the mutable state. Applies updates one at a time and publishes a
/// fresh snapshot after each one that changed something.
struct Applier {
    state: SyncState,
    rx: mpsc::Receiver<Envelope>,
    state_tx: watch::Sender<Arc<SyncState>>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Applier {
    async fn run(mut self) {
        debug!("State applier starting");

        loop {
            tokio::select! {
                envelope = self.rx.recv() => {
                    let Some(Envelope { update, ack }) = envelope else {
                        break;
                    };
                    let kind = update.kind();
                    if self.state.apply(update, now_millis()) {
                        self.state_tx.send_replace(Arc::new(self.state.clone()));
                    } else {
                        debug!(kind, "Update discarded");
                    }
                    let _ = ack.send(());
                }

                _ = self.shutdown_rx.recv() => {
                    break;
                }
            }
        }

        debug!("State applier stopped");
    }
}

struct Background {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl Background {
    async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

#[derive(Default)]
struct EngineTasks {
    applier: Option<Background>,
    ticker: Option<TickerHandle>,
    push: Option<PushHandle>,
    statistics_refresh: Option<Background>,
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Fleet data sync engine.
///
/// ## Usage
/// ```rust,ignore
/// let engine = SyncEngine::from_config(FleetConfig::load_or_default(None))?;
/// engine.start().await?;
///
/// let mut updates = engine.subscribe();
/// while updates.changed().await.is_ok() {
///     let state = updates.borrow_and_update().clone();
///     println!("{} vehicles, {}", state.vehicles.len(), engine.freshness_label());
/// }
/// ```
pub struct SyncEngine {
    config: FleetConfig,
    backend: Arc<dyn FleetBackend>,
    sink: UpdateSink,
    state_rx: watch::Receiver<Arc<SyncState>>,
    label_rx: watch::Receiver<String>,
    tasks: Mutex<EngineTasks>,
}

impl SyncEngine {
    /// Creates the engine and spawns its applier and ticker.
    ///
    /// Must be called inside a tokio runtime. Nothing is fetched until
    /// [`start`](Self::start) or an explicit load.
    pub fn spawn(config: FleetConfig, backend: Arc<dyn FleetBackend>) -> Self {
        let (tx, rx) = mpsc::channel(config.engine.update_queue_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(Arc::new(SyncState::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let applier = Applier {
            state: SyncState::new(),
            rx,
            state_tx,
            shutdown_rx,
        };
        let applier_task = tokio::spawn(applier.run());

        let (ticker, label_rx) = FreshnessTicker::spawn(config.tick_interval(), state_rx.clone());

        SyncEngine {
            config,
            backend,
            sink: UpdateSink {
                tx,
                list_seq: Arc::new(AtomicU64::new(0)),
            },
            state_rx,
            label_rx,
            tasks: Mutex::new(EngineTasks {
                applier: Some(Background {
                    shutdown_tx,
                    task: applier_task,
                }),
                ticker: Some(ticker),
                ..Default::default()
            }),
        }
    }

    /// Creates the engine over the REST backend described by `config`.
    pub fn from_config(config: FleetConfig) -> SyncResult<Self> {
        config.validate()?;
        let backend = HttpBackend::from_config(&config)?;
        Ok(Self::spawn(config, Arc::new(backend)))
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initial load, then the push channel.
    ///
    /// The snapshot and statistics fetches run concurrently; `loading` drops
    /// once both have settled, whatever their outcome.
    pub async fn start(&self) -> SyncResult<()> {
        info!(api = %self.config.api.base_url, "Sync engine starting");

        let (fleet, ()) = tokio::join!(self.load_all(), self.refresh_statistics());
        if let Err(e) = fleet {
            warn!(error = %e, "Initial fleet load failed, showing empty state");
        }
        self.sink.submit(StateUpdate::InitialLoadComplete).await?;

        let mut tasks = self.tasks.lock().await;

        if self.config.push.enabled && tasks.push.is_none() {
            let push_config = PushConfig::from(&self.config.push);
            tasks.push = Some(PushChannel::spawn(push_config, self.sink.clone()));
        }

        if tasks.statistics_refresh.is_none() {
            if let Some(period) = self.config.statistics_refresh() {
                tasks.statistics_refresh = Some(self.spawn_statistics_refresh(period));
            }
        }

        info!("Sync engine started");
        Ok(())
    }

    /// Stops the push channel (cancelling any pending reconnect wait), the
    /// periodic refresh, the ticker and the applier. Idempotent.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;

        if let Some(push) = tasks.push.take() {
            push.shutdown().await;
        }
        if let Some(refresh) = tasks.statistics_refresh.take() {
            refresh.stop().await;
        }
        if let Some(ticker) = tasks.ticker.take() {
            ticker.shutdown().await;
        }
        if let Some(applier) = tasks.applier.take() {
            applier.stop().await;
        }

        info!("Sync engine stopped");
    }

    fn spawn_statistics_refresh(&self, period: Duration) -> Background {
        let backend = self.backend.clone();
        let sink = self.sink.clone();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.recv() => break,
                }

                // A slow fetch must not hold up shutdown
                tokio::select! {
                    _ = refresh_statistics_via(backend.as_ref(), &sink) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Background { shutdown_tx, task }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Fetches the full fleet.
    ///
    /// Success replaces the list, refreshes fleet-derived statistics and
    /// clears any active filter. Failure keeps the previous list, records the
    /// error and degrades the phase.
    pub async fn load_all(&self) -> SyncResult<()> {
        let seq = self.sink.next_list_seq();
        self.sink.submit(StateUpdate::ListRequested { seq }).await?;

        match self.backend.fetch_all().await {
            Ok(vehicles) => {
                info!(seq, count = vehicles.len(), "Fleet snapshot loaded");
                self.sink.submit(StateUpdate::FleetLoaded { seq, vehicles }).await
            }
            Err(e) => {
                warn!(seq, error = %e, "Fleet snapshot fetch failed");
                self.sink
                    .submit(StateUpdate::ListFailed { seq, error: e.to_string() })
                    .await?;
                Err(e)
            }
        }
    }

    /// Loads the list for a filter token.
    ///
    /// Accepts the filter bar's tokens: `"all"` reloads the full fleet and
    /// `"moving"` means `en_route`.
    pub async fn load_by_status(&self, token: &str) -> SyncResult<()> {
        match VehicleStatus::from_filter_token(token)? {
            None => self.load_all().await,
            Some(status) => self.load_status(status).await,
        }
    }

    /// Replaces the displayed list with vehicles in `status`. Statistics are
    /// left alone.
    pub async fn load_status(&self, status: VehicleStatus) -> SyncResult<()> {
        let seq = self.sink.next_list_seq();
        self.sink.submit(StateUpdate::ListRequested { seq }).await?;

        match self.backend.fetch_by_status(&status).await {
            Ok(vehicles) => {
                info!(seq, %status, count = vehicles.len(), "Filtered list loaded");
                self.sink
                    .submit(StateUpdate::FilteredLoaded { seq, status, vehicles })
                    .await
            }
            Err(e) => {
                warn!(seq, %status, error = %e, "Filtered list fetch failed");
                self.sink
                    .submit(StateUpdate::ListFailed { seq, error: e.to_string() })
                    .await?;
                Err(e)
            }
        }
    }

    /// Fetches one vehicle and makes it the selection.
    ///
    /// Returns `None` when the vehicle is unknown or the fetch fails; the
    /// reason is surfaced through `error`.
    pub async fn load_by_id(&self, id: &str) -> Option<Vehicle> {
        let failure = match self.backend.fetch_by_id(id).await {
            Ok(Some(vehicle)) => {
                debug!(id, "Vehicle detail loaded");
                self.submit_quietly(StateUpdate::DetailLoaded(vehicle.clone())).await;
                return Some(vehicle);
            }
            Ok(None) => SyncError::NotFound(id.to_string()),
            Err(e) => e,
        };

        warn!(id, error = %failure, "Vehicle detail fetch failed");
        self.submit_quietly(StateUpdate::DetailFailed {
            error: failure.to_string(),
        })
        .await;
        None
    }

    /// Opens the detail view for `id`: the fetched record when available,
    /// otherwise the brief record from the current list.
    pub async fn open_vehicle(&self, id: &str) -> Option<Vehicle> {
        if let Some(vehicle) = self.load_by_id(id).await {
            return Some(vehicle);
        }

        let cached = self.snapshot().vehicles.iter().find(|v| v.id == id).cloned()?;
        debug!(id, "Falling back to cached vehicle record");
        self.select(cached.clone()).await;
        Some(cached)
    }

    /// Fetches authoritative statistics. Failures are logged only.
    pub async fn refresh_statistics(&self) {
        refresh_statistics_via(self.backend.as_ref(), &self.sink).await;
    }

    /// Applies a push frame exactly as the push channel would.
    pub async fn ingest_push(&self, message: PushMessage) -> SyncResult<()> {
        self.sink.ingest_push(message).await
    }

    pub async fn select(&self, vehicle: Vehicle) {
        self.submit_quietly(StateUpdate::Selected(Some(vehicle))).await;
    }

    pub async fn clear_selection(&self) {
        self.submit_quietly(StateUpdate::Selected(None)).await;
    }

    async fn submit_quietly(&self, update: StateUpdate) {
        let kind = update.kind();
        if let Err(e) = self.sink.submit(update).await {
            debug!(kind, error = %e, "Update not applied");
        }
    }

    // =========================================================================
    // Read API
    // =========================================================================

    /// Latest published state.
    pub fn snapshot(&self) -> Arc<SyncState> {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SyncState>> {
        self.state_rx.clone()
    }

    /// Receiver notified whenever the freshness label text changes.
    pub fn subscribe_freshness(&self) -> watch::Receiver<String> {
        self.label_rx.clone()
    }

    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.snapshot().vehicles.clone()
    }

    pub fn statistics(&self) -> Option<Statistics> {
        self.snapshot().statistics
    }

    pub fn selected_vehicle(&self) -> Option<Vehicle> {
        self.snapshot().selected_vehicle.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.snapshot().connection_status
    }

    pub fn freshness_label(&self) -> String {
        self.label_rx.borrow().clone()
    }

    pub fn error(&self) -> Option<String> {
        self.snapshot().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot().loading
    }

    pub fn phase(&self) -> Phase {
        self.snapshot().phase
    }

    /// Search/filter/sort over the displayed list.
    pub fn query(&self, query: &VehicleQuery) -> Vec<Vehicle> {
        query.apply(&self.snapshot().vehicles)
    }
}

async fn refresh_statistics_via(backend: &dyn FleetBackend, sink: &UpdateSink) {
    match backend.fetch_statistics().await {
        Ok(patch) => {
            debug!(total = ?patch.total, "Statistics loaded");
            if let Err(e) = sink.submit(StateUpdate::StatisticsLoaded(patch)).await {
                debug!(error = %e, "Statistics not applied");
            }
        }
        Err(e) => warn!(error = %e, "Statistics fetch failed"),
    }
}
