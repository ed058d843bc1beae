//! Events a connected transport delivers to the session manager.

use crate::channels::inbound::MessageBatch;

/// Why a connection closed. Anything but an explicit logout is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The account was logged out; reconnecting requires manual re-auth.
    LoggedOut,
    /// Transient failure (network drop, poll error). The session reconnects.
    Recoverable(String),
}

/// Connection-state change from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    /// The session is authenticated and live.
    Open,
    /// A login challenge to render for manual scanning.
    Qr(String),
    /// The connection closed.
    Closed { reason: DisconnectReason },
}

/// One file of the transport's credential state changed. Persisted synchronously
/// by the session manager; empty contents mean the file was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub file: String,
    pub contents: Vec<u8>,
}

/// Event stream payload: connection updates, credential updates, inbound batches.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connection(ConnectionUpdate),
    Credentials(CredentialUpdate),
    Messages(MessageBatch),
}
