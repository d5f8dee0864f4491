//! Shared helpers for the integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use common::crypto::SecretKey;
use common::transport::{InboundReceiver, LocalConfig, LocalNetworkTransport};

pub const ALICE: &str = "1111111111111111111111111111111111111111111111111111111111111111";
pub const BOB: &str = "2222222222222222222222222222222222222222222222222222222222222222";

pub fn key(hex: &str) -> SecretKey {
    SecretKey::from_hex(hex).unwrap()
}

/// Loopback-only config with scanning off, starting at `preferred_port`.
pub fn loopback_config(preferred_port: u16) -> LocalConfig {
    LocalConfig {
        bind_ip: "127.0.0.1".parse().unwrap(),
        preferred_port,
        scan_subnets: false,
        http_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Build a local transport that is not bound yet.
pub fn local_transport(private_key: &str, preferred_port: u16) -> (LocalNetworkTransport, InboundReceiver) {
    let (tx, rx) = flume::unbounded();
    let transport =
        LocalNetworkTransport::new(loopback_config(preferred_port), key(private_key), tx).unwrap();
    (transport, rx)
}

pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
