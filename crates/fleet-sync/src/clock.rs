//! # Freshness Ticker
//!
//! Re-renders the "Last Updated" label on a wall-clock cadence, independent
//! of network traffic, and immediately whenever the confirmed instant moves.
//!
//! ```text
//!   interval (1s) ──┐
//!                   ├──► relabel ──► watch<String> ──► render layer
//!   state change ───┘    (only published when the text differs)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use fleet_core::freshness::now_millis;

use crate::state::SyncState;

/// Shortest tick the ticker will run at; `tokio::time::interval` rejects zero.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Handle to a running ticker.
pub struct TickerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Stops the ticker and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

pub struct FreshnessTicker {
    tick: Duration,
    state_rx: watch::Receiver<Arc<SyncState>>,
    label_tx: watch::Sender<String>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl FreshnessTicker {
    /// Spawns the ticker. The returned receiver always holds the current label.
    pub fn spawn(
        tick: Duration,
        state_rx: watch::Receiver<Arc<SyncState>>,
    ) -> (TickerHandle, watch::Receiver<String>) {
        let initial = state_rx.borrow().freshness_label_at(now_millis());
        let (label_tx, label_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let ticker = FreshnessTicker {
            tick: tick.max(MIN_TICK),
            state_rx,
            label_tx,
            shutdown_rx,
        };
        let task = tokio::spawn(ticker.run());

        (TickerHandle { shutdown_tx, task }, label_rx)
    }

    async fn run(mut self) {
        info!(tick_ms = self.tick.as_millis() as u64, "Freshness ticker starting");

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut confirmed = self.state_rx.borrow().last_confirmed_at();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.relabel();
                }

                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        debug!("State publisher dropped");
                        break;
                    }
                    let latest = self.state_rx.borrow_and_update().last_confirmed_at();
                    if latest != confirmed {
                        confirmed = latest;
                        self.relabel();
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    break;
                }
            }
        }

        info!("Freshness ticker stopped");
    }

    fn relabel(&self) {
        let label = self.state_rx.borrow().freshness_label_at(now_millis());
        self.label_tx.send_if_modified(|current| {
            if *current == label {
                false
            } else {
                *current = label;
                true
            }
        });
    }
}
