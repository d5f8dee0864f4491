//! Message transports
//!
//! A transport moves sealed [`EncryptedEnvelope`]s between processes. Each
//! one seals outbound payloads for the channel's owner and opens inbound
//! envelopes with the key shared with the declared sender, then pushes the
//! plaintext into a shared flume sink. The same logical message may arrive
//! over several transports; deduplication happens further up.

use std::fmt::Debug;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::crypto::{CryptoError, PublicKey, SecretKey};
use crate::envelope::EncryptedEnvelope;

pub mod local;
pub mod overlay;

pub use local::{LocalConfig, LocalNetworkTransport};
pub use overlay::{OverlayConfig, OverlayTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Local,
    Overlay,
    Memory,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Local => f.write_str("local"),
            TransportKind::Overlay => f.write_str("overlay"),
            TransportKind::Memory => f.write_str("memory"),
        }
    }
}

/// A decrypted inbound payload.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub sender: PublicKey,
    pub payload: Vec<u8>,
    pub via: TransportKind,
}

pub type InboundSender = flume::Sender<ReceivedMessage>;
pub type InboundReceiver = flume::Receiver<ReceivedMessage>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no free port in {first}..={last}: {reason}")]
    Bind { first: u16, last: u16, reason: String },
    #[error("request from {remote} does not match declared addresses {declared:?}")]
    IdentityMismatch { remote: IpAddr, declared: Vec<IpAddr> },
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("overlay error: {0}")]
    Overlay(String),
    #[error("inbound channel closed")]
    InboundClosed,
}

impl TransportError {
    pub fn is_decryption(&self) -> bool {
        matches!(self, TransportError::Crypto(CryptoError::Decryption))
    }
}

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    fn kind(&self) -> TransportKind;

    /// Start receiving messages addressed to `channel`. Idempotent.
    async fn subscribe(&self, channel: &Channel) -> Result<(), TransportError>;

    /// Seal `payload` for the owner of `channel` and push it out.
    async fn send(&self, channel: &Channel, payload: &[u8]) -> Result<(), TransportError>;

    async fn shutdown(&self) {}
}

/// Parse a raw envelope, open it and hand the plaintext to `inbound`.
pub(crate) fn open_and_forward(
    bytes: &[u8],
    identity: &SecretKey,
    inbound: &InboundSender,
    via: TransportKind,
) -> Result<PublicKey, TransportError> {
    let envelope = EncryptedEnvelope::from_slice(bytes)
        .map_err(|e| TransportError::MalformedPayload(e.to_string()))?;
    let (sender, payload) = envelope.open(identity)?;
    inbound
        .send(ReceivedMessage {
            sender,
            payload,
            via,
        })
        .map_err(|_| TransportError::InboundClosed)?;
    Ok(sender)
}
