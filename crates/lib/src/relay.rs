//! Relay: filter inbound messages, forward to the agent, send the response back.
//!
//! A message is forwarded at most once, and only if its sender is allow-listed
//! and it carries nonempty text or an attachment. There is no retry and no
//! queueing; a failed forward gets one best-effort fallback text.

use crate::agent::{AgentBackend, AgentRequest, FilePayload};
use crate::channels::{
    extract_attachment, extract_text, AttachmentRef, BatchKind, InboundMessage, MessageBatch,
    OutboundFile,
};
use crate::session::MessagePort;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sent to the original sender when forwarding or reply delivery fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Turns inbound batches into agent calls and outbound sends.
pub struct Relay {
    allow_list: HashSet<String>,
    agent: Arc<dyn AgentBackend>,
    port: Arc<dyn MessagePort>,
}

impl Relay {
    pub fn new(
        allowed_senders: impl IntoIterator<Item = String>,
        agent: Arc<dyn AgentBackend>,
        port: Arc<dyn MessagePort>,
    ) -> Self {
        Self {
            allow_list: allowed_senders.into_iter().collect(),
            agent,
            port,
        }
    }

    /// Process batches from the session until the channel closes.
    /// Batches are handled one at a time; a slow agent delays later batches.
    pub fn start(self: Arc<Self>, mut inbound_rx: mpsc::Receiver<MessageBatch>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(batch) = inbound_rx.recv().await {
                self.process_batch(batch).await;
            }
            log::debug!("relay: inbound channel closed, stopping");
        })
    }

    /// Handle one batch: history backfill is ignored entirely.
    pub async fn process_batch(&self, batch: MessageBatch) {
        if batch.kind != BatchKind::Live {
            log::debug!("relay: ignoring history batch of {} message(s)", batch.messages.len());
            return;
        }
        for message in batch.messages {
            self.process_message(message).await;
        }
    }

    async fn process_message(&self, message: InboundMessage) {
        let Some(sender) = message.sender else {
            return;
        };
        if !self.allow_list.contains(&sender) {
            log::debug!("relay: sender {} not allow-listed, dropping", sender);
            return;
        }
        let Some(content) = message.content else {
            return;
        };
        let text = extract_text(&content);
        let attachment = extract_attachment(&content);
        if text.trim().is_empty() && attachment.is_none() {
            log::debug!("relay: message from {} has no text or attachment, dropping", sender);
            return;
        }
        if let Err(e) = self.forward(&sender, text, attachment).await {
            log::warn!("relay: forwarding message from {} failed: {}", sender, e);
            if let Err(e) = self.port.send_text(&sender, FALLBACK_REPLY).await {
                log::debug!("relay: fallback reply to {} failed: {}", sender, e);
            }
        }
    }

    /// Download the attachment (if any), call the agent, and deliver the
    /// response: reply text first, then the file.
    async fn forward(
        &self,
        sender: &str,
        text: String,
        attachment: Option<AttachmentRef>,
    ) -> Result<(), String> {
        let attachment = match attachment {
            Some(a) => {
                let bytes = self.port.fetch_media(&a.media).await?;
                Some(FilePayload {
                    base64: BASE64.encode(bytes),
                    filename: a.filename,
                    mimetype: a.mimetype,
                })
            }
            None => None,
        };
        let request = AgentRequest {
            sender: sender.to_string(),
            text,
            attachment,
        };
        let response = self.agent.ask(&request).await.map_err(|e| e.to_string())?;
        if let Some(reply) = response.reply {
            if !reply.trim().is_empty() {
                self.port.send_text(sender, &reply).await?;
            }
        }
        if let Some(file) = response.file {
            let bytes = BASE64
                .decode(file.base64.as_bytes())
                .map_err(|e| format!("decoding agent file payload: {}", e))?;
            let outbound = OutboundFile {
                bytes,
                filename: file.filename,
                mimetype: file.mimetype,
            };
            self.port.send_file(sender, &outbound).await?;
        }
        Ok(())
    }
}
