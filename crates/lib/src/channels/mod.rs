//! Messaging transport boundary.
//!
//! All messaging-protocol complexity (handshake, encryption, multi-device sync)
//! lives behind the `Connector`/`Connection` seam. A connected transport reports
//! back over a single event stream with three event kinds: connection updates,
//! credential updates, and inbound message batches.

mod connector;
mod events;
mod inbound;
mod telegram;

pub use connector::{Connection, Connector, OutboundFile};
pub use events::{ConnectionUpdate, CredentialUpdate, DisconnectReason, SessionEvent};
pub use inbound::{
    extract_attachment, extract_text, AttachmentRef, BatchKind, DocumentContent, ImageContent,
    InboundMessage, MediaRef, MessageBatch, MessageContent,
};
pub use telegram::TelegramConnector;
