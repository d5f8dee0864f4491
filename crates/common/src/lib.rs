/**
 * Named pub/sub topics. A channel is usually
 *  a user's public key, hex encoded.
 */
pub mod channel;
/**
 * Cryptographic types and operations.
 *  - Ed25519 identities, X25519 key agreement
 *  - AES-256-GCM shared-key encryption
 *  - Hex helpers over all of the above
 */
pub mod crypto;
/**
 * Registry of peers found on the local network
 *  and the channels each one listens on.
 */
pub mod directory;
/**
 * The sealed wire message every transport carries.
 */
pub mod envelope;
pub mod messenger;
/**
 * Application message types, deduplication
 *  and persistence of what comes in.
 */
pub mod router;
pub mod storage;
/**
 * In-process hub and nodes for tests.
 */
pub mod testkit;
/**
 * Local network (HTTP gossip) and overlay (iroh)
 *  transports.
 */
pub mod transport;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::channel::Channel;
    pub use crate::crypto::{PublicKey, SecretKey};
    pub use crate::directory::{PeerDirectory, PeerRecord};
    pub use crate::envelope::EncryptedEnvelope;
    pub use crate::messenger::{inbound_channel, ChannelMessenger, MessengerError};
    pub use crate::router::{AppMessage, MessageRouter, RouterError, RouterEvent, UserProfile};
    pub use crate::storage::{FileStore, MemoryStore, Storage, Table};
    pub use crate::transport::{
        LocalConfig, LocalNetworkTransport, OverlayConfig, OverlayTransport, Transport,
        TransportError, TransportKind,
    };
    pub use crate::version::build_info;
}
