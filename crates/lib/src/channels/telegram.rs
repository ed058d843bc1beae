//! Telegram transport: long-poll getUpdates, sendMessage/sendDocument, getFile downloads.
//!
//! The Bot API is the external messaging library here: it keeps no local
//! credential state (the bot token is the whole session), so this transport
//! never emits credential updates. A 401 from the API is treated as a logout.

use crate::channels::connector::{Connection, Connector, OutboundFile};
use crate::channels::events::{ConnectionUpdate, DisconnectReason, SessionEvent};
use crate::channels::inbound::{
    BatchKind, DocumentContent, ImageContent, InboundMessage, MediaRef, MessageBatch,
    MessageContent,
};
use crate::store::CredentialState;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;

/// Consecutive getUpdates failures before the connection is reported closed.
const MAX_POLL_FAILURES: u32 = 3;

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub document: Option<TelegramDocument>,
    #[serde(default)]
    pub photo: Option<Vec<TelegramPhotoSize>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    #[serde(default)]
    result: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    #[serde(default)]
    file_path: Option<String>,
}

enum PollError {
    Unauthorized,
    Other(String),
}

/// Map one Telegram update to the transport-neutral inbound shape.
/// The chat id doubles as the sender identifier so replies land in the same chat.
pub fn update_to_inbound(update: TelegramUpdate) -> Option<InboundMessage> {
    let msg = update.message?;
    let sender = msg.chat.id.to_string();
    let document = msg.document.map(|d| DocumentContent {
        caption: msg.caption.clone(),
        filename: d.file_name,
        mimetype: d.mime_type,
        media: MediaRef { id: d.file_id },
    });
    // Telegram sends every size of a photo; relay the largest one.
    let image = if document.is_some() {
        None
    } else {
        msg.photo.and_then(|sizes| {
            sizes
                .into_iter()
                .max_by_key(|p| p.file_size.unwrap_or(0))
                .map(|p| ImageContent {
                    caption: msg.caption.clone(),
                    mimetype: None,
                    media: MediaRef { id: p.file_id },
                })
        })
    };
    let content = MessageContent {
        text: msg.text,
        extended_text: None,
        document,
        image,
    };
    if content.text.is_none()
        && content.document.is_none()
        && content.image.is_none()
        && msg.caption.is_none()
    {
        return None;
    }
    Some(InboundMessage {
        sender: Some(sender),
        content: Some(content),
    })
}

/// Connects a Telegram bot session: validates the token via getMe, then
/// long-polls getUpdates in a background task.
pub struct TelegramConnector {
    token: String,
    client: reqwest::Client,
}

impl TelegramConnector {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Connector for TelegramConnector {
    async fn connect(
        &self,
        _credentials: &CredentialState,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn Connection>, String> {
        let url = format!("{}/bot{}/getMe", TELEGRAM_API_BASE, self.token);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("getMe failed: {} {}", status, body));
        }
        let conn = Arc::new(TelegramConnection {
            token: self.token.clone(),
            client: self.client.clone(),
            running: AtomicBool::new(true),
        });
        let _ = events
            .send(SessionEvent::Connection(ConnectionUpdate::Open))
            .await;
        log::info!("telegram transport: starting getUpdates long-poll loop");
        let loop_conn = conn.clone();
        tokio::spawn(async move {
            run_get_updates_loop(loop_conn, events).await;
        });
        Ok(conn)
    }
}

/// An open Telegram session (long-poll loop plus Bot API send/download calls).
pub struct TelegramConnection {
    token: String,
    client: reqwest::Client,
    running: AtomicBool,
}

impl TelegramConnection {
    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), PollError> {
        let url = format!(
            "{}/bot{}/getUpdates?timeout={}",
            TELEGRAM_API_BASE, self.token, LONG_POLL_TIMEOUT
        );
        let url = if let Some(off) = offset {
            format!("{}&offset={}", url, off)
        } else {
            url
        };
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::Other(e.to_string()))?;
        if res.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PollError::Unauthorized);
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PollError::Other(format!("getUpdates failed: {} {}", status, body)));
        }
        let data: GetUpdatesResponse = res
            .json()
            .await
            .map_err(|e| PollError::Other(e.to_string()))?;
        if !data.ok {
            return Err(PollError::Other("getUpdates returned ok: false".to_string()));
        }
        let next_offset = data
            .result
            .iter()
            .map(|u| u.update_id)
            .max()
            .map(|id| id + 1);
        Ok((data.result, next_offset))
    }
}

async fn run_get_updates_loop(conn: Arc<TelegramConnection>, events: mpsc::Sender<SessionEvent>) {
    let mut offset: Option<i64> = None;
    let mut failures: u32 = 0;
    while conn.running() {
        match conn.get_updates(offset).await {
            Ok((updates, next)) => {
                failures = 0;
                offset = next;
                let messages: Vec<InboundMessage> =
                    updates.into_iter().filter_map(update_to_inbound).collect();
                if messages.is_empty() {
                    continue;
                }
                let batch = MessageBatch {
                    kind: BatchKind::Live,
                    messages,
                };
                if events.send(SessionEvent::Messages(batch)).await.is_err() {
                    log::debug!("telegram: event channel closed, stopping loop");
                    return;
                }
            }
            Err(PollError::Unauthorized) => {
                log::warn!("telegram getUpdates unauthorized, treating as logout");
                let _ = events
                    .send(SessionEvent::Connection(ConnectionUpdate::Closed {
                        reason: DisconnectReason::LoggedOut,
                    }))
                    .await;
                return;
            }
            Err(PollError::Other(e)) => {
                failures += 1;
                if failures >= MAX_POLL_FAILURES {
                    let _ = events
                        .send(SessionEvent::Connection(ConnectionUpdate::Closed {
                            reason: DisconnectReason::Recoverable(e),
                        }))
                        .await;
                    return;
                }
                log::debug!("telegram getUpdates error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("telegram transport: getUpdates loop stopped");
}

#[async_trait]
impl Connection for TelegramConnection {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), String> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.token);
        let body = serde_json::json!({ "chat_id": recipient, "text": text });
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendMessage failed: {} {}", status, body));
        }
        Ok(())
    }

    async fn send_file(&self, recipient: &str, file: &OutboundFile) -> Result<(), String> {
        let url = format!("{}/bot{}/sendDocument", TELEGRAM_API_BASE, self.token);
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.mimetype)
            .map_err(|e| format!("invalid mime type {}: {}", file.mimetype, e))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", recipient.to_string())
            .part("document", part);
        let res = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendDocument failed: {} {}", status, body));
        }
        Ok(())
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, String> {
        let url = format!(
            "{}/bot{}/getFile?file_id={}",
            TELEGRAM_API_BASE, self.token, media.id
        );
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("getFile failed: {} {}", status, body));
        }
        let data: GetFileResponse = res.json().await.map_err(|e| e.to_string())?;
        let file_path = data
            .result
            .filter(|_| data.ok)
            .and_then(|f| f.file_path)
            .ok_or("getFile returned no file_path")?;
        let download_url = format!("{}/file/bot{}/{}", TELEGRAM_API_BASE, self.token, file_path);
        let res = self
            .client
            .get(&download_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            return Err(format!("file download failed: {}", res.status()));
        }
        let bytes = res.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }

    fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(msg: TelegramMessage) -> TelegramUpdate {
        TelegramUpdate {
            update_id: 1,
            message: Some(msg),
        }
    }

    #[test]
    fn text_message_maps_to_inbound() {
        let inbound = update_to_inbound(update(TelegramMessage {
            chat: TelegramChat { id: 42 },
            text: Some("hello".to_string()),
            ..Default::default()
        }))
        .expect("inbound");
        assert_eq!(inbound.sender.as_deref(), Some("42"));
        let content = inbound.content.expect("content");
        assert_eq!(content.text.as_deref(), Some("hello"));
        assert!(content.document.is_none());
    }

    #[test]
    fn captioned_document_maps_to_document_content() {
        let inbound = update_to_inbound(update(TelegramMessage {
            chat: TelegramChat { id: 7 },
            caption: Some("see attached".to_string()),
            document: Some(TelegramDocument {
                file_id: "f-1".to_string(),
                file_name: Some("notes.txt".to_string()),
                mime_type: Some("text/plain".to_string()),
            }),
            ..Default::default()
        }))
        .expect("inbound");
        let doc = inbound.content.and_then(|c| c.document).expect("document");
        assert_eq!(doc.caption.as_deref(), Some("see attached"));
        assert_eq!(doc.filename.as_deref(), Some("notes.txt"));
        assert_eq!(doc.media.id, "f-1");
    }

    #[test]
    fn photo_picks_largest_size() {
        let inbound = update_to_inbound(update(TelegramMessage {
            chat: TelegramChat { id: 7 },
            photo: Some(vec![
                TelegramPhotoSize {
                    file_id: "small".to_string(),
                    file_size: Some(100),
                },
                TelegramPhotoSize {
                    file_id: "large".to_string(),
                    file_size: Some(9000),
                },
            ]),
            ..Default::default()
        }))
        .expect("inbound");
        let img = inbound.content.and_then(|c| c.image).expect("image");
        assert_eq!(img.media.id, "large");
    }

    #[test]
    fn update_without_payload_is_dropped() {
        assert!(update_to_inbound(update(TelegramMessage {
            chat: TelegramChat { id: 7 },
            ..Default::default()
        }))
        .is_none());
        assert!(update_to_inbound(TelegramUpdate {
            update_id: 1,
            message: None,
        })
        .is_none());
    }
}
