use iroh::{NodeId, SecretKey as IrohSecretKey};
use sha2::{Digest, Sha256};

use crate::channel::Channel;

const TOPIC_DOMAIN: &[u8] = b"hexhoot-overlay-topic";

/// Rendezvous key for a channel.
///
/// Anyone who knows the channel name derives the same key, and its node id
/// is what gets published to (and resolved from) the DHT.
pub fn topic_secret(channel: &Channel) -> IrohSecretKey {
    let mut hasher = Sha256::new();
    hasher.update(TOPIC_DOMAIN);
    hasher.update(channel.to_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    IrohSecretKey::from_bytes(&digest)
}

pub fn topic_node_id(channel: &Channel) -> NodeId {
    topic_secret(channel).public()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_is_deterministic() {
        let channel = Channel::new("abcdef").unwrap();
        assert_eq!(topic_node_id(&channel), topic_node_id(&channel));
        assert_eq!(
            topic_secret(&channel).to_bytes(),
            topic_secret(&Channel::new("ABCDEF").unwrap()).to_bytes()
        );
    }

    #[test]
    fn test_topics_differ_per_channel() {
        let a = Channel::new("aa").unwrap();
        let b = Channel::new("bb").unwrap();
        assert_ne!(topic_node_id(&a), topic_node_id(&b));
    }
}
