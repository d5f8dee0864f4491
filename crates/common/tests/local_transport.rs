//! Local network transport over real loopback sockets

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ::common::channel::Channel;
use ::common::directory::PeerRecord;
use ::common::messenger::ChannelMessenger;
use ::common::router::{MessageRouter, DEFAULT_DEDUP_CAPACITY};
use ::common::storage::{MemoryStore, Record};
use ::common::transport::local::{router, LocalNetworkTransport, SelfDescription};
use ::common::transport::Transport;
use ::common::version::APPLICATION;
use axum::extract::ConnectInfo;
use http::{Request, StatusCode};
use tokio::sync::watch;
use tower::ServiceExt;

use common::{key, local_transport, loopback, loopback_config, ALICE, BOB};

fn description(ips: &[&str], port: u16) -> SelfDescription {
    SelfDescription {
        application: APPLICATION.to_string(),
        version: "0.1.0".to_string(),
        ip: ips[0].parse().unwrap(),
        ips: ips.iter().map(|ip| ip.parse().unwrap()).collect(),
        port,
        hosts: Default::default(),
        channels: Default::default(),
    }
}

fn post(path: &str, from: SocketAddr, body: Vec<u8>) -> Request<axum::body::Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(from));
    request
}

#[tokio::test]
async fn test_spoofed_announcement_is_rejected() {
    let (transport, _rx) = local_transport(ALICE, 44200);
    let body = serde_json::to_vec(&description(&["9.9.9.9"], 43946)).unwrap();

    let response = router(transport.clone())
        .oneshot(post("/", "8.8.8.8:1234".parse().unwrap(), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(transport.directory().is_empty());
}

#[tokio::test]
async fn test_matching_announcement_is_accepted() {
    let (transport, _rx) = local_transport(ALICE, 44210);
    let body = serde_json::to_vec(&description(&["10.1.2.3"], 43946)).unwrap();

    let response = router(transport.clone())
        .oneshot(post("/", "10.1.2.3:50000".parse().unwrap(), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let record = transport.directory().get("10.1.2.3".parse().unwrap()).unwrap();
    assert_eq!(record.port, 43946);
}

#[tokio::test]
async fn test_spoofed_subscription_is_rejected() {
    let (transport, _rx) = local_transport(ALICE, 44220);
    let body = serde_json::json!({"ips": ["9.9.9.9"], "channelNames": ["abcd"]});

    let response = router(transport.clone())
        .oneshot(post(
            "/subscribeChannels",
            "8.8.8.8:1234".parse().unwrap(),
            serde_json::to_vec(&body).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_message_is_bad_request() {
    let (transport, rx) = local_transport(ALICE, 44230);
    let response = router(transport)
        .oneshot(post("/message", "10.0.0.9:1".parse().unwrap(), b"garbage".to_vec()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(rx.is_empty());
}

#[tokio::test]
async fn test_port_fallback() {
    let _occupied = std::net::TcpListener::bind(loopback(43946)).unwrap();
    let (transport, _rx) = local_transport(ALICE, 43946);
    let port = transport.initialize().await.unwrap();
    assert_eq!(port, 43947);

    let description: SelfDescription = reqwest::get(format!("http://{}/", loopback(port)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(description.port, 43947);

    transport.stop().await;
}

#[tokio::test]
async fn test_two_instances_exchange_messages() {
    let (alice, alice_rx) = local_transport(ALICE, 44240);
    let (bob, _bob_rx) = local_transport(BOB, 44240);

    let alice_port = alice.initialize().await.unwrap();
    let bob_port = bob.initialize().await.unwrap();
    assert_ne!(alice_port, bob_port);

    let alice_channel = Channel::from(key(ALICE).public());
    alice.subscribe(&alice_channel).await.unwrap();

    // bob finds alice and announces himself back
    bob.probe(loopback(alice_port)).await;
    let record = bob.directory().get("127.0.0.1".parse().unwrap()).unwrap();
    assert_eq!(record.port, alice_port);
    assert!(record.subscribed_channels.contains(&alice_channel));
    assert!(alice.directory().contains("127.0.0.1".parse().unwrap()));

    bob.send(&alice_channel, b"{\"hello\":true}").await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), alice_rx.recv_async())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.sender, key(BOB).public());
    assert_eq!(received.payload, b"{\"hello\":true}");

    alice.stop().await;
    bob.stop().await;
}

#[tokio::test]
async fn test_reinitialize_rebinds_preferred_port() {
    let (transport, _rx) = local_transport(ALICE, 44250);
    let first = transport.initialize().await.unwrap();

    transport.directory().upsert(PeerRecord {
        ip: "10.1.2.3".parse().unwrap(),
        port: 43946,
        application: APPLICATION.to_string(),
        version: "0.1.0".to_string(),
        subscribed_channels: Default::default(),
    });

    // the old listener is gone before the rebind, so the port comes back
    let second = transport.initialize().await.unwrap();
    assert_eq!(first, second);
    assert!(transport.directory().is_empty());

    let description: SelfDescription = reqwest::get(format!("http://{}/", loopback(second)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(description.port, second);

    transport.stop().await;
}

#[tokio::test]
async fn test_reinit_cooldown() {
    let mut config = loopback_config(44256);
    config.reinit_cooldown = Duration::from_secs(60);
    let (tx, _rx) = flume::unbounded();
    let transport = LocalNetworkTransport::new(config, key(ALICE), tx).unwrap();

    assert!(transport.cooldown_elapsed());
    transport.initialize().await.unwrap();
    assert!(!transport.cooldown_elapsed());

    transport.stop().await;
}

#[tokio::test]
async fn test_reinitialize_cancels_pending_gossip() {
    // accepts connections but never answers
    let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let silent_port = silent.local_addr().unwrap().port();

    let (transport, _rx) = local_transport(ALICE, 44260);
    let mut announcement = description(&["10.1.2.3"], 43946);
    announcement.hosts.insert(
        "127.0.0.1".parse().unwrap(),
        PeerRecord {
            ip: "127.0.0.1".parse().unwrap(),
            port: silent_port,
            application: APPLICATION.to_string(),
            version: "0.1.0".to_string(),
            subscribed_channels: Default::default(),
        },
    );

    let response = router(transport.clone())
        .oneshot(post(
            "/",
            "10.1.2.3:50000".parse().unwrap(),
            serde_json::to_vec(&announcement).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.pending_probes(), 1);

    transport.initialize().await.unwrap();
    assert_eq!(transport.pending_probes(), 0);
    assert!(transport.directory().is_empty());

    transport.stop().await;
}

struct LocalNode {
    transport: LocalNetworkTransport,
    router: MessageRouter,
    shutdown_tx: watch::Sender<()>,
}

impl LocalNode {
    async fn start(private_key: &str, name: &str, preferred_port: u16) -> Self {
        let (transport, rx) = local_transport(private_key, preferred_port);
        transport.initialize().await.unwrap();

        let messenger = ChannelMessenger::new(vec![Arc::new(transport.clone())], rx);
        let router = MessageRouter::new(
            key(private_key),
            Arc::new(MemoryStore::new()),
            messenger.clone(),
            DEFAULT_DEDUP_CAPACITY,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        router.spawn(shutdown_rx.clone());
        messenger.spawn_dispatcher(shutdown_rx);

        let mut profile = Record::new();
        profile.insert("name".to_string(), name.into());
        router.login(private_key, profile).await.unwrap();

        Self {
            transport,
            router,
            shutdown_tx,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.transport.stop().await;
    }
}

#[tokio::test]
async fn test_friend_request_over_local_network() {
    let alice = LocalNode::start(ALICE, "alice", 44270).await;
    let bob = LocalNode::start(BOB, "bob", 44270).await;
    let alice_port = alice.transport.port().await.unwrap();

    // bob finds alice; his announcement carries his own channel
    bob.transport.probe(loopback(alice_port)).await;

    let alice_key = key(ALICE).public();
    bob.router.send_friend_request(&alice_key).await.unwrap();

    let answered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let name = bob
                .router
                .user_info(&alice_key)
                .await
                .unwrap()
                .and_then(|record| record.get("name").cloned());
            if name == Some("alice".into()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(answered.is_ok(), "bob never received alice's profile");

    // alice heard the request but keeps no friend record for bob
    assert!(alice.router.friends().await.unwrap().is_empty());

    alice.stop().await;
    bob.stop().await;
}
