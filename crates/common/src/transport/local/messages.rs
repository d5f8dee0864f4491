use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::directory::PeerRecord;

/// Body of `GET /` and `POST /`: who we are plus everything we know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfDescription {
    pub application: String,
    pub version: String,
    pub ip: IpAddr,
    pub ips: Vec<IpAddr>,
    pub port: u16,
    #[serde(rename = "hostsWithHexHootMap", default)]
    pub hosts: BTreeMap<IpAddr, PeerRecord>,
    #[serde(rename = "listOfChannelsSubscribedTo", default)]
    pub channels: BTreeSet<Channel>,
}

/// Body of `POST /subscribeChannels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeChannels {
    pub ips: Vec<IpAddr>,
    pub channel_names: Vec<Channel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_description_wire_shape() {
        let json = serde_json::json!({
            "application": "hexhoot",
            "version": "0.1.0",
            "ip": "192.168.1.10",
            "ips": ["192.168.1.10", "127.0.0.1"],
            "port": 43946,
            "hostsWithHexHootMap": {
                "192.168.1.11": {
                    "ip": "192.168.1.11",
                    "port": 43947,
                    "application": "hexhoot",
                    "version": "0.1.0",
                    "listOfChannelsSubscribedTo": ["abcd"]
                }
            },
            "listOfChannelsSubscribedTo": ["ef01"]
        });
        let desc: SelfDescription = serde_json::from_value(json).unwrap();
        assert_eq!(desc.port, 43946);
        assert_eq!(desc.hosts.len(), 1);
        assert!(desc.channels.contains(&Channel::new("ef01").unwrap()));
    }

    #[test]
    fn test_subscribe_channels_wire_shape() {
        let body = SubscribeChannels {
            ips: vec!["10.0.0.3".parse().unwrap()],
            channel_names: vec![Channel::new("aa").unwrap()],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["channelNames"][0], "aa");
        assert_eq!(json["ips"][0], "10.0.0.3");
    }
}
