use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// What we know about one HexHoot instance on the local network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub ip: IpAddr,
    pub port: u16,
    pub application: String,
    pub version: String,
    #[serde(rename = "listOfChannelsSubscribedTo", default)]
    pub subscribed_channels: BTreeSet<Channel>,
}

impl PeerRecord {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn url(&self) -> Option<Url> {
        Url::parse(&format!("http://{}", self.socket_addr())).ok()
    }

    pub fn is_subscribed_to(&self, channel: &Channel) -> bool {
        self.subscribed_channels.contains(channel)
    }
}

/// Registry of known peers keyed by IP.
///
/// Merges are commutative: channel sets only ever grow (union) and scalar
/// fields take the latest write. Every mutation happens under one write
/// lock, so concurrent handlers cannot interleave halfway through a merge.
/// The directory never filters out the local process; callers do.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Arc<RwLock<HashMap<IpAddr, PeerRecord>>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge `record`. Returns `true` if the peer was not known before.
    pub fn upsert(&self, record: PeerRecord) -> bool {
        let mut peers = self.peers.write();
        match peers.get_mut(&record.ip) {
            Some(existing) => {
                existing.port = record.port;
                existing.application = record.application;
                existing.version = record.version;
                existing.subscribed_channels.extend(record.subscribed_channels);
                false
            }
            None => {
                peers.insert(record.ip, record);
                true
            }
        }
    }

    /// Add channels to a known peer. Unknown peers are left alone.
    pub fn add_channels_to_peer<I>(&self, ip: IpAddr, channels: I) -> bool
    where
        I: IntoIterator<Item = Channel>,
    {
        match self.peers.write().get_mut(&ip) {
            Some(record) => {
                record.subscribed_channels.extend(channels);
                true
            }
            None => false,
        }
    }

    pub fn add_channel_to_peer(&self, ip: IpAddr, channel: Channel) -> bool {
        self.add_channels_to_peer(ip, std::iter::once(channel))
    }

    pub fn url_for(&self, ip: IpAddr) -> Option<Url> {
        self.peers.read().get(&ip).and_then(PeerRecord::url)
    }

    pub fn get(&self, ip: IpAddr) -> Option<PeerRecord> {
        self.peers.read().get(&ip).cloned()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.peers.read().contains_key(&ip)
    }

    /// Snapshot of every record, ordered by IP.
    pub fn all(&self) -> Vec<PeerRecord> {
        let mut records: Vec<_> = self.peers.read().values().cloned().collect();
        records.sort_by_key(|r| r.ip);
        records
    }

    pub fn subscribed_to(&self, channel: &Channel) -> Vec<PeerRecord> {
        self.all()
            .into_iter()
            .filter(|r| r.is_subscribed_to(channel))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Forget everything; used when the network changes underneath us.
    pub fn clear(&self) {
        self.peers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str) -> Channel {
        Channel::new(name).unwrap()
    }

    fn record(ip: &str, port: u16, channels: &[&str]) -> PeerRecord {
        PeerRecord {
            ip: ip.parse().unwrap(),
            port,
            application: "hexhoot".to_string(),
            version: "0.1.0".to_string(),
            subscribed_channels: channels.iter().map(|c| channel(c)).collect(),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let once = PeerDirectory::new();
        once.upsert(record("192.168.1.4", 43946, &["aa", "bb"]));

        let twice = PeerDirectory::new();
        twice.upsert(record("192.168.1.4", 43946, &["aa", "bb"]));
        twice.upsert(record("192.168.1.4", 43946, &["aa", "bb"]));

        assert_eq!(once.all(), twice.all());
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn test_upsert_unions_channels_and_overwrites_scalars() {
        let directory = PeerDirectory::new();
        assert!(directory.upsert(record("10.0.0.2", 43946, &["aa"])));
        let mut newer = record("10.0.0.2", 43948, &["bb"]);
        newer.version = "0.2.0".to_string();
        assert!(!directory.upsert(newer));

        let stored = directory.get("10.0.0.2".parse().unwrap()).unwrap();
        assert_eq!(stored.port, 43948);
        assert_eq!(stored.version, "0.2.0");
        assert_eq!(
            stored.subscribed_channels,
            [channel("aa"), channel("bb")].into_iter().collect()
        );
    }

    #[test]
    fn test_channels_never_shrink() {
        let directory = PeerDirectory::new();
        directory.upsert(record("10.0.0.2", 43946, &["aa", "bb"]));
        directory.upsert(record("10.0.0.2", 43946, &[]));
        let stored = directory.get("10.0.0.2".parse().unwrap()).unwrap();
        assert_eq!(stored.subscribed_channels.len(), 2);
    }

    #[test]
    fn test_add_channel_to_unknown_peer_is_noop() {
        let directory = PeerDirectory::new();
        assert!(!directory.add_channel_to_peer("10.0.0.9".parse().unwrap(), channel("aa")));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_add_channel_is_idempotent() {
        let directory = PeerDirectory::new();
        directory.upsert(record("10.0.0.2", 43946, &[]));
        let ip = "10.0.0.2".parse().unwrap();
        directory.add_channel_to_peer(ip, channel("aa"));
        directory.add_channel_to_peer(ip, channel("aa"));
        assert_eq!(directory.get(ip).unwrap().subscribed_channels.len(), 1);
        assert_eq!(directory.subscribed_to(&channel("aa")).len(), 1);
    }

    #[test]
    fn test_url_for() {
        let directory = PeerDirectory::new();
        directory.upsert(record("192.168.0.7", 43947, &[]));
        let url = directory.url_for("192.168.0.7".parse().unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://192.168.0.7:43947/");
        assert!(directory.url_for("192.168.0.8".parse().unwrap()).is_none());
    }

    #[test]
    fn test_record_wire_shape() {
        let json = serde_json::to_value(record("10.0.0.2", 43946, &["aa"])).unwrap();
        assert_eq!(json["ip"], "10.0.0.2");
        assert_eq!(json["listOfChannelsSubscribedTo"][0], "aa");
    }
}
