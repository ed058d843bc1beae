//! Session manager: owns the one messaging connection and its reconnect policy.
//!
//! Recoverable disconnects reconnect after a fixed delay; an explicit logout is
//! terminal (manual re-auth required, only the HTTP surface keeps running).
//! Credential updates are persisted before further events are processed.

use crate::channels::{
    Connection, ConnectionUpdate, Connector, DisconnectReason, MediaRef, MessageBatch,
    OutboundFile, SessionEvent,
};
use crate::store::CredentialStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Delay before reconnecting after a recoverable disconnect or connect failure.
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Session lifecycle. LoggedOut is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Open,
    LoggedOut,
}

/// Outbound operations the relay needs from the session (trait seam for tests).
#[async_trait]
pub trait MessagePort: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), String>;
    async fn send_file(&self, recipient: &str, file: &OutboundFile) -> Result<(), String>;
    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, String>;
}

/// Maintains exactly one logical connection to the messaging network.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    store: CredentialStore,
    conn: RwLock<Option<Arc<dyn Connection>>>,
    status: RwLock<SessionStatus>,
    retry_delay: Duration,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, store: CredentialStore) -> Self {
        Self {
            connector,
            store,
            conn: RwLock::new(None),
            status: RwLock::new(SessionStatus::Disconnected),
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override the reconnect delay (tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Start the connect/reconnect loop. Inbound message batches are forwarded
    /// to `inbound_tx`. Returns a handle to the background task.
    pub fn start(self: Arc<Self>, inbound_tx: mpsc::Sender<MessageBatch>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(inbound_tx).await;
        })
    }

    async fn run_loop(&self, inbound_tx: mpsc::Sender<MessageBatch>) {
        loop {
            self.set_status(SessionStatus::Connecting).await;
            let credentials = match self.store.load() {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("session: loading credentials failed: {:#}", e);
                    Default::default()
                }
            };
            let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(64);
            match self.connector.connect(&credentials, event_tx).await {
                Ok(conn) => {
                    *self.conn.write().await = Some(conn.clone());
                    let reason = self.pump_events(&mut event_rx, &inbound_tx).await;
                    conn.close();
                    *self.conn.write().await = None;
                    match reason {
                        DisconnectReason::LoggedOut => {
                            self.set_status(SessionStatus::LoggedOut).await;
                            log::error!("session: logged out; manual re-auth required");
                            return;
                        }
                        DisconnectReason::Recoverable(e) => {
                            self.set_status(SessionStatus::Disconnected).await;
                            log::warn!(
                                "session: connection closed ({}), reconnecting in {:?}",
                                e,
                                self.retry_delay
                            );
                        }
                    }
                }
                Err(e) => {
                    self.set_status(SessionStatus::Disconnected).await;
                    log::warn!("session: connect failed ({}), retrying in {:?}", e, self.retry_delay);
                }
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Drain events from the open connection until it closes. Returns the close reason.
    async fn pump_events(
        &self,
        event_rx: &mut mpsc::Receiver<SessionEvent>,
        inbound_tx: &mpsc::Sender<MessageBatch>,
    ) -> DisconnectReason {
        loop {
            let Some(event) = event_rx.recv().await else {
                return DisconnectReason::Recoverable("event stream ended".to_string());
            };
            match event {
                SessionEvent::Connection(ConnectionUpdate::Open) => {
                    self.set_status(SessionStatus::Open).await;
                    log::info!("session: connection open");
                }
                SessionEvent::Connection(ConnectionUpdate::Qr(code)) => {
                    render_qr_challenge(&code);
                }
                SessionEvent::Connection(ConnectionUpdate::Closed { reason }) => {
                    return reason;
                }
                SessionEvent::Credentials(update) => {
                    // Persist before touching the next event; the transport
                    // assumes the write happened when it continues.
                    if let Err(e) = self.store.persist(&update) {
                        log::error!("session: persisting credentials failed: {:#}", e);
                    }
                }
                SessionEvent::Messages(batch) => {
                    if inbound_tx.send(batch).await.is_err() {
                        return DisconnectReason::Recoverable("relay stopped".to_string());
                    }
                }
            }
        }
    }

    async fn set_status(&self, status: SessionStatus) {
        *self.status.write().await = status;
    }

    pub async fn status(&self) -> SessionStatus {
        *self.status.read().await
    }

    /// Whether a user session is currently open (for /health).
    pub async fn connected(&self) -> bool {
        *self.status.read().await == SessionStatus::Open
    }

    async fn current_conn(&self) -> Result<Arc<dyn Connection>, String> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| "no open session".to_string())
    }

    pub async fn send_text(&self, recipient: &str, text: &str) -> Result<(), String> {
        self.current_conn().await?.send_text(recipient, text).await
    }

    pub async fn send_file(&self, recipient: &str, file: &OutboundFile) -> Result<(), String> {
        self.current_conn().await?.send_file(recipient, file).await
    }

    pub async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, String> {
        self.current_conn().await?.fetch_media(media).await
    }
}

#[async_trait]
impl MessagePort for SessionManager {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), String> {
        SessionManager::send_text(self, recipient, text).await
    }

    async fn send_file(&self, recipient: &str, file: &OutboundFile) -> Result<(), String> {
        SessionManager::send_file(self, recipient, file).await
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, String> {
        SessionManager::fetch_media(self, media).await
    }
}

/// Print a login QR challenge for manual scanning. Interactive/operational step,
/// not a runtime decision point.
fn render_qr_challenge(code: &str) {
    log::info!("session: login QR challenge received");
    println!("scan this code with the messaging app to log in:\n{}", code);
}
