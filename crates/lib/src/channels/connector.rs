//! Transport traits: connect to the messaging network, send, download media.

use crate::channels::events::SessionEvent;
use crate::channels::inbound::MediaRef;
use crate::store::CredentialState;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An outbound file attachment (bytes + filename + MIME type).
#[derive(Debug, Clone)]
pub struct OutboundFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mimetype: String,
}

/// Establishes one session on the messaging network. Events (connection state,
/// credential changes, inbound batches) are delivered over `events` until the
/// connection closes or is dropped.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: &CredentialState,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn Connection>, String>;
}

/// Handle to an open connection (send, media download, stop).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a text message to a recipient.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), String>;

    /// Send a file attachment to a recipient.
    async fn send_file(&self, recipient: &str, file: &OutboundFile) -> Result<(), String>;

    /// Download the bytes behind an inbound media reference.
    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, String>;

    /// Stop the connection's background work (e.g. poll loop).
    fn close(&self);
}
