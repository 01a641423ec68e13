//! # Push Channel
//!
//! WebSocket client for server-pushed fleet updates, reconnecting forever
//! on a fixed delay.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Push Channel States                                │
//! │                                                                         │
//! │  ┌────────────┐   handshake ok   ┌────────────┐                        │
//! │  │ Connecting │ ───────────────► │    Open    │  (clears `error`)      │
//! │  └─────┬──────┘                  └─────┬──────┘                        │
//! │        │ connect failed                │ close frame / stream end /    │
//! │        │                               │ socket error                  │
//! │        ▼                               ▼                               │
//! │  ┌──────────────────────────────────────────┐                          │
//! │  │                 Closed                   │                          │
//! │  └─────────────────────┬────────────────────┘                          │
//! │                        │ fixed delay (default 5s)                      │
//! │                        ▼                                               │
//! │                 ┌──────────────┐   next attempt                        │
//! │                 │ Reconnecting │ ────────────► (handshake as above)    │
//! │                 └──────────────┘                                       │
//! │                                                                         │
//! │  RECONNECT POLICY                                                       │
//! │  ────────────────                                                       │
//! │  One attempt per close, constant delay, no retry cap.                   │
//! │  Shutdown cancels the pending wait; at most one wait is ever pending.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The channel never touches state directly: every frame and status change
//! goes through the engine's update queue.

use backoff::backoff::{Backoff, Constant};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::PushSettings;
use crate::engine::UpdateSink;
use crate::error::{SyncError, SyncResult};
use crate::protocol::PushMessage;
use crate::state::{ConnectionStatus, StateUpdate};

type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Push Configuration
// =============================================================================

/// Runtime settings for the push channel.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket URL to connect to.
    pub url: String,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Fixed wait between a close and the next attempt.
    pub reconnect_delay: Duration,

    /// Ping interval for keepalive.
    pub ping_interval: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        PushConfig {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl From<&PushSettings> for PushConfig {
    fn from(settings: &PushSettings) -> Self {
        PushConfig {
            url: settings.url.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs),
            ping_interval: Duration::from_secs(settings.ping_interval_secs.max(1)),
        }
    }
}

// =============================================================================
// Push Handle
// =============================================================================

/// Handle to a running push channel.
pub struct PushHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Closes the socket or cancels the pending reconnect, then waits for
    /// the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Push channel task ended abnormally");
        }
    }
}

// =============================================================================
// Push Channel
// =============================================================================

/// How a connected session ended.
enum SessionEnd {
    /// Server closed or the stream ended; reconnect.
    Closed,
    /// Shutdown requested or the engine went away; stop.
    Stop,
}

pub struct PushChannel {
    config: PushConfig,
    sink: UpdateSink,
    shutdown_rx: mpsc::Receiver<()>,
}

impl PushChannel {
    /// Spawns the channel. The first connection attempt starts immediately.
    pub(crate) fn spawn(config: PushConfig, sink: UpdateSink) -> PushHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let channel = PushChannel {
            config,
            sink,
            shutdown_rx,
        };
        let task = tokio::spawn(channel.run());
        PushHandle { shutdown_tx, task }
    }

    /// Main connection loop.
    async fn run(mut self) {
        info!(url = %self.config.url, "Push channel starting");

        let mut delay = Constant::new(self.config.reconnect_delay);
        let mut attempt = 0u64;
        let mut status = ConnectionStatus::Connecting;

        loop {
            attempt += 1;
            if !self.publish(status).await {
                break;
            }

            let connected = tokio::select! {
                result = connect_with_timeout(&self.config) => result,
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown during connect");
                    break;
                }
            };

            match connected {
                Ok(stream) => {
                    info!(attempt, "Push channel open");
                    if !self.publish(ConnectionStatus::Open).await {
                        break;
                    }
                    match self.session(stream).await {
                        Ok(SessionEnd::Stop) => break,
                        Ok(SessionEnd::Closed) => info!("Push channel closed by server"),
                        Err(e) => {
                            error!(error = %e, "Push channel error");
                            if !self.report_error().await {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(attempt, error = %e, "Push channel connect failed");
                    if !self.report_error().await {
                        break;
                    }
                }
            }

            if !self.publish(ConnectionStatus::Closed).await {
                break;
            }

            let wait = delay.next_backoff().unwrap_or(self.config.reconnect_delay);
            debug!(?wait, attempt, "Waiting before reconnect");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    status = ConnectionStatus::Reconnecting;
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown during reconnect wait");
                    break;
                }
            }
        }

        // Engine may already be gone during shutdown
        let _ = self.sink.submit(StateUpdate::Connection(ConnectionStatus::Closed)).await;
        info!("Push channel stopped");
    }

    /// Returns false once the engine has stopped accepting updates.
    async fn publish(&self, status: ConnectionStatus) -> bool {
        debug!(%status, "Push channel status");
        self.sink.submit(StateUpdate::Connection(status)).await.is_ok()
    }

    async fn report_error(&self) -> bool {
        self.sink.submit(StateUpdate::PushFailed).await.is_ok()
    }

    /// Reads frames until the connection ends.
    async fn session(&mut self, stream: PushStream) -> SyncResult<SessionEnd> {
        let (mut write, mut read) = stream.split();

        let start = tokio::time::Instant::now() + self.config.ping_interval;
        let mut ping_interval = tokio::time::interval_at(start, self.config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            match PushMessage::from_json(&text) {
                                Ok(message) => {
                                    if let Err(e) = self.sink.ingest_push(message).await {
                                        debug!(error = %e, "Engine stopped, closing push channel");
                                        let _ = write.send(WsMessage::Close(None)).await;
                                        return Ok(SessionEnd::Stop);
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "Dropping malformed push message");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            write.send(WsMessage::Pong(data)).await?;
                        }
                        Some(Ok(WsMessage::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(?frame, "Received close frame");
                            return Ok(SessionEnd::Closed);
                        }
                        Some(Ok(WsMessage::Binary(_))) => {
                            warn!("Ignoring binary push frame");
                        }
                        Some(Ok(WsMessage::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(SyncError::from(e));
                        }
                        None => {
                            return Ok(SessionEnd::Closed);
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    write.send(WsMessage::Ping(vec![].into())).await?;
                    debug!("Sent ping");
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing push channel");
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(SessionEnd::Stop);
                }
            }
        }
    }
}

async fn connect_with_timeout(config: &PushConfig) -> SyncResult<PushStream> {
    match timeout(config.connect_timeout, connect_async(&config.url)).await {
        Ok(Ok((stream, response))) => {
            debug!(status = ?response.status(), "WebSocket handshake complete");
            Ok(stream)
        }
        Ok(Err(e)) => Err(SyncError::from(e)),
        Err(_) => Err(SyncError::Timeout(config.connect_timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;

    #[test]
    fn test_push_config_from_settings() {
        let mut settings = FleetConfig::default().push;
        settings.url = "ws://127.0.0.1:9000".into();
        settings.ping_interval_secs = 0;

        let config = PushConfig::from(&settings);
        assert_eq!(config.url, "ws://127.0.0.1:9000");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.ping_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_reconnect_delay_is_constant() {
        let mut delay = Constant::new(PushConfig::default().reconnect_delay);
        for _ in 0..100 {
            assert_eq!(delay.next_backoff(), Some(Duration::from_secs(5)));
        }
    }
}
