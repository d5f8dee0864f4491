//! Application messages on top of channels.
//!
//! The router turns user intents (chat, friend request, profile change)
//! into channel sends, and classifies what comes back: chats are
//! deduplicated and stored, friend requests are answered with our profile,
//! profile updates are merged into `Friends`. Every accepted inbound
//! message is announced once to the registered listeners.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;

mod dedup;
mod message;

pub use dedup::{DedupLog, DEFAULT_DEDUP_CAPACITY};
pub use message::{AppMessage, ChatDirection, ChatEntry, ChatMessage, UserProfile};

use crate::channel::Channel;
use crate::crypto::{CryptoError, PublicKey, SecretKey};
use crate::messenger::ChannelMessenger;
use crate::storage::{Key, Record, Snapshot, Storage, StorageError, Table};
use crate::transport::{ReceivedMessage, TransportKind};

/// `LoggedInUserInfo` holds a single row under this key.
const LOCAL_PROFILE_KEY: i64 = 0;
const PRIVATE_KEY_FIELD: &str = "privateKey";

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no local profile, log in first")]
    NoLocalProfile,
    #[error("key {got} is not this node's identity {expected}")]
    IdentityMismatch { expected: PublicKey, got: PublicKey },
    #[error("invalid key: {0}")]
    Crypto(#[from] CryptoError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which profile-carrying message to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMessageKind {
    FriendRequest,
    UserInformation,
}

/// Notification for one classified inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterEvent {
    pub sender: String,
    pub via: TransportKind,
    pub kind: String,
    pub message: AppMessage,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn record_of(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

struct Inner {
    identity: SecretKey,
    storage: Arc<dyn Storage>,
    messenger: ChannelMessenger,
    dedup: Mutex<DedupLog>,
    listeners: Mutex<Vec<flume::Sender<RouterEvent>>>,
}

#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("identity", &self.inner.identity.public())
            .field("storage", &self.inner.storage)
            .field("messenger", &self.inner.messenger)
            .finish()
    }
}

impl MessageRouter {
    /// `identity` must be the key the messenger's transports seal and open
    /// envelopes with. The stored profile always follows it.
    pub fn new(
        identity: SecretKey,
        storage: Arc<dyn Storage>,
        messenger: ChannelMessenger,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                storage,
                messenger,
                dedup: Mutex::new(DedupLog::new(dedup_capacity)),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn messenger(&self) -> &ChannelMessenger {
        &self.inner.messenger
    }

    pub fn identity(&self) -> &SecretKey {
        &self.inner.identity
    }

    fn check_identity(&self, private_key: &str) -> Result<(), RouterError> {
        let got = SecretKey::from_hex(private_key)?.public();
        let expected = self.inner.identity.public();
        if got != expected {
            return Err(RouterError::IdentityMismatch { expected, got });
        }
        Ok(())
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// Register a listener for classified inbound messages.
    pub fn on_event(&self) -> flume::Receiver<RouterEvent> {
        let (tx, rx) = flume::unbounded();
        self.inner.listeners.lock().push(tx);
        rx
    }

    fn notify(&self, event: RouterEvent) {
        self.inner
            .listeners
            .lock()
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    /* Local profile */

    /// Store the local identity and profile, then listen on our own channel.
    ///
    /// Fails with [`RouterError::IdentityMismatch`] unless `private_key` is
    /// the router's identity.
    pub async fn login(&self, private_key: &str, profile: Record) -> Result<UserProfile, RouterError> {
        self.check_identity(private_key)?;

        let mut record = profile;
        record.insert("key".to_string(), json!(LOCAL_PROFILE_KEY));
        record.insert(PRIVATE_KEY_FIELD.to_string(), json!(self.inner.identity.to_hex()));
        self.inner.storage.put(Table::LoggedInUserInfo, record).await?;

        let own = self.inner.identity.public();
        self.subscribe_own_channel(&own).await;
        tracing::info!(key = %own, "logged in");
        self.local_public_profile().await
    }

    /// The stored profile including `privateKey`.
    pub async fn local_private_profile(&self) -> Result<Record, RouterError> {
        self.inner
            .storage
            .get(Table::LoggedInUserInfo, &Key::from(LOCAL_PROFILE_KEY))
            .await?
            .ok_or(RouterError::NoLocalProfile)
    }

    /// What we share with peers: no private key, `key` is the public key.
    pub async fn local_public_profile(&self) -> Result<UserProfile, RouterError> {
        let mut record = self.local_private_profile().await?;
        let public = self.inner.identity.public();
        record.remove(PRIVATE_KEY_FIELD);
        record.insert("key".to_string(), json!(public.to_hex()));
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    /// Merge `fields` into the local profile and tell every friend.
    pub async fn update_profile(&self, mut fields: Record) -> Result<UserProfile, RouterError> {
        let mut record = self.local_private_profile().await?;
        fields.remove("key");
        if let Some(private_key) = fields.remove(PRIVATE_KEY_FIELD) {
            self.check_identity(private_key.as_str().unwrap_or_default())?;
        }
        record.extend(fields);
        self.inner.storage.put(Table::LoggedInUserInfo, record).await?;

        for friend in self.friend_keys().await? {
            if let Err(e) = self
                .send_request_or_response(&friend, ProfileMessageKind::UserInformation)
                .await
            {
                tracing::warn!(%friend, "failed to send profile update: {}", e);
            }
        }
        self.local_public_profile().await
    }

    async fn subscribe_own_channel(&self, own: &PublicKey) {
        if let Err(e) = self.inner.messenger.subscribe(&Channel::from(own)).await {
            tracing::warn!(key = %own, "could not subscribe to own channel: {}", e);
        }
    }

    /* Outbound */

    /// Transport failures are logged, never returned.
    async fn deliver(&self, peer: &PublicKey, message: &AppMessage) -> Result<bool, RouterError> {
        let payload = message.to_vec()?;
        match self.inner.messenger.send(&Channel::from(peer), &payload).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(%peer, kind = message.kind(), "message not delivered: {}", e);
                Ok(false)
            }
        }
    }

    /// Send a chat message to `peer` and record it locally.
    pub async fn send_chat(&self, peer: &PublicKey, text: &str) -> Result<ChatEntry, RouterError> {
        self.local_private_profile().await?;

        let entry = ChatEntry {
            key: peer.to_hex(),
            message: ChatMessage {
                timestamp: now_ms(),
                direction: ChatDirection::Sent,
                message: text.to_string(),
            },
        };
        self.inner
            .storage
            .put(Table::Chat, record_of(serde_json::to_value(&entry)?))
            .await?;

        self.deliver(peer, &AppMessage::ChatMessage(entry.message.clone()))
            .await?;
        self.touch_friend(peer, entry.message.timestamp).await?;
        Ok(entry)
    }

    /// Ask `peer` to be friends and remember them.
    pub async fn send_friend_request(&self, peer: &PublicKey) -> Result<(), RouterError> {
        self.send_request_or_response(peer, ProfileMessageKind::FriendRequest)
            .await?;
        self.inner
            .storage
            .put(Table::Friends, record_of(json!({ "key": peer.to_hex() })))
            .await?;
        Ok(())
    }

    /// Send our public profile to `peer`, as a request or as a reply.
    pub async fn send_request_or_response(
        &self,
        peer: &PublicKey,
        kind: ProfileMessageKind,
    ) -> Result<bool, RouterError> {
        let profile = self.local_public_profile().await?;
        let message = match kind {
            ProfileMessageKind::FriendRequest => AppMessage::FriendRequest(profile),
            ProfileMessageKind::UserInformation => AppMessage::UserInformation(profile),
        };
        self.deliver(peer, &message).await
    }

    async fn touch_friend(&self, peer: &PublicKey, timestamp: u64) -> Result<(), RouterError> {
        self.inner
            .storage
            .put(
                Table::Friends,
                record_of(json!({
                    "key": peer.to_hex(),
                    "lastMessageTimestamp": timestamp,
                    "isRead": false,
                })),
            )
            .await?;
        Ok(())
    }

    /* Queries */

    pub async fn friends(&self) -> Result<Vec<Record>, RouterError> {
        Ok(self.inner.storage.get_all(Table::Friends).await?)
    }

    async fn friend_keys(&self) -> Result<Vec<PublicKey>, RouterError> {
        Ok(self
            .friends()
            .await?
            .iter()
            .filter_map(|friend| friend.get("key")?.as_str())
            .filter_map(|key| PublicKey::from_hex(key).ok())
            .collect())
    }

    /// Stored profile for `key`; our own public profile if the key is ours.
    pub async fn user_info(&self, key: &PublicKey) -> Result<Option<Record>, RouterError> {
        if self.inner.identity.public() == *key {
            match self.local_public_profile().await {
                Ok(profile) => return Ok(Some(profile.to_record()?)),
                Err(RouterError::NoLocalProfile) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(self
            .inner
            .storage
            .get(Table::Friends, &Key::from(key.to_hex()))
            .await?)
    }

    pub async fn mark_chat_read(&self, peer: &PublicKey) -> Result<(), RouterError> {
        self.inner
            .storage
            .put(
                Table::Friends,
                record_of(json!({ "key": peer.to_hex(), "isRead": true })),
            )
            .await?;
        Ok(())
    }

    /// Conversation with `peer`, oldest first.
    pub async fn messages_with(&self, peer: &PublicKey) -> Result<Vec<ChatEntry>, RouterError> {
        let peer = peer.to_hex();
        // timestamps are the sender's clock, so don't cut off at our `now`
        let rows = self
            .inner
            .storage
            .get_in_range(
                Table::Chat,
                &Key::pair(peer.as_str(), 0i64),
                &Key::pair(peer.as_str(), i64::MAX),
            )
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(RouterError::from))
            .collect()
    }

    pub async fn set_preference(&self, name: &str, value: Value) -> Result<(), RouterError> {
        self.inner
            .storage
            .put(
                Table::Preferences,
                record_of(json!({ "key": name, "value": value })),
            )
            .await?;
        Ok(())
    }

    pub async fn preference(&self, name: &str) -> Result<Option<Value>, RouterError> {
        Ok(self
            .inner
            .storage
            .get(Table::Preferences, &Key::from(name))
            .await?
            .and_then(|mut record| record.remove("value")))
    }

    pub async fn export_snapshot(&self) -> Result<Snapshot, RouterError> {
        Ok(self.inner.storage.export().await?)
    }

    /// Replace the store with `snapshot`.
    ///
    /// A login record from another identity keeps its profile fields but is
    /// rebound to ours; the transports cannot speak for any other key.
    pub async fn import_snapshot(&self, mut snapshot: Snapshot) -> Result<(), RouterError> {
        let own = self.inner.identity.public();
        if let Some(rows) = snapshot.tables.get_mut(&Table::LoggedInUserInfo) {
            for row in rows.iter_mut() {
                let imported = row
                    .get(PRIVATE_KEY_FIELD)
                    .and_then(Value::as_str)
                    .and_then(|hex| SecretKey::from_hex(hex).ok())
                    .map(|secret| secret.public());
                if imported != Some(own) {
                    tracing::warn!(key = %own, "snapshot login belongs to another identity, keeping ours");
                }
                row.insert(
                    PRIVATE_KEY_FIELD.to_string(),
                    json!(self.inner.identity.to_hex()),
                );
            }
        }
        self.inner.storage.import(snapshot).await?;

        if self.local_private_profile().await.is_ok() {
            self.subscribe_own_channel(&own).await;
        }
        Ok(())
    }

    /* Inbound */

    /// Classify and act on one inbound message.
    ///
    /// Returns the event that was announced, or `None` when the message was
    /// dropped (malformed or a duplicate chat).
    pub async fn handle_inbound(
        &self,
        received: ReceivedMessage,
    ) -> Result<Option<RouterEvent>, RouterError> {
        let sender = received.sender;
        let message = match AppMessage::from_slice(&received.payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%sender, via = %received.via, "dropping malformed payload: {}", e);
                return Ok(None);
            }
        };

        match &message {
            AppMessage::FriendRequest(profile) => {
                // the same request arrives once per transport
                let id = Self::payload_id(&sender, &received.payload);
                if !self.inner.dedup.lock().insert(id) {
                    tracing::debug!(%sender, via = %received.via, "duplicate friend request dropped");
                    return Ok(None);
                }
                tracing::info!(%sender, name = ?profile.name, "friend request received");
                match self
                    .send_request_or_response(&sender, ProfileMessageKind::UserInformation)
                    .await
                {
                    Ok(_) => {}
                    Err(RouterError::NoLocalProfile) => {
                        tracing::warn!(%sender, "cannot answer friend request without a local profile")
                    }
                    Err(e) => return Err(e),
                }
            }
            AppMessage::UserInformation(profile) => {
                if profile.key.trim_start_matches("0x").to_lowercase() != sender.to_hex() {
                    tracing::warn!(%sender, claimed = %profile.key, "profile key does not match sender, ignoring");
                    return Ok(None);
                }
                let mut record = profile.to_record()?;
                record.insert("key".to_string(), json!(sender.to_hex()));
                self.inner.storage.put(Table::Friends, record).await?;
                tracing::debug!(%sender, "stored peer profile");
            }
            AppMessage::ChatMessage(chat) => {
                let id = DedupLog::id(&sender, chat.timestamp);
                if !self.inner.dedup.lock().insert(id.clone()) {
                    tracing::debug!(%sender, timestamp = chat.timestamp, via = %received.via, "duplicate chat dropped");
                    return Ok(None);
                }
                if let Err(e) = self.store_received_chat(&sender, chat).await {
                    // let a redundant copy or a retry try again
                    self.inner.dedup.lock().remove(&id);
                    return Err(e);
                }
            }
            AppMessage::Unrecognized { kind, .. } => {
                tracing::info!(%sender, %kind, "unrecognized message type");
            }
        }

        let event = RouterEvent {
            sender: sender.to_hex(),
            via: received.via,
            kind: message.kind().to_string(),
            message,
        };
        self.notify(event.clone());
        Ok(Some(event))
    }

    fn payload_id(sender: &PublicKey, payload: &[u8]) -> String {
        let digest = Sha256::digest(payload);
        format!("{}:{}", sender.to_hex(), hex::encode(digest))
    }

    async fn store_received_chat(&self, sender: &PublicKey, chat: &ChatMessage) -> Result<(), RouterError> {
        let entry = ChatEntry {
            key: sender.to_hex(),
            message: ChatMessage {
                direction: ChatDirection::Received,
                ..chat.clone()
            },
        };
        self.inner
            .storage
            .put(Table::Chat, record_of(serde_json::to_value(&entry)?))
            .await?;
        self.touch_friend(sender, chat.timestamp).await
    }

    /// Consume the messenger's inbound stream until shutdown.
    pub fn spawn(&self, mut shutdown_rx: watch::Receiver<()>) -> JoinHandle<()> {
        let router = self.clone();
        let inbound = self.inner.messenger.on_message();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = inbound.recv_async() => match received {
                        Ok(received) => received,
                        Err(_) => break,
                    },
                };
                if let Err(e) = router.handle_inbound(received).await {
                    tracing::error!("failed to handle inbound message: {}", e);
                }
            }
            tracing::debug!("message router stopped");
        })
    }
}
