//! Two fully wired nodes talking through the in-memory hub

mod common;

use std::time::Duration;

use ::common::router::{AppMessage, ChatDirection};
use ::common::testkit::{MemoryHub, TestNode};

use common::{ALICE, BOB};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_friend_request_is_answered_with_profile() -> anyhow::Result<()> {
    let hub = MemoryHub::new();
    let alice = TestNode::login(&hub, "alice", ALICE).await?;
    let bob = TestNode::login(&hub, "bob", BOB).await?;
    let alice_events = alice.router().on_event();

    bob.router().send_friend_request(&alice.public_key()).await?;

    // alice sees the request but keeps no friend record for bob
    let event = tokio::time::timeout(WAIT, alice_events.recv_async()).await??;
    assert!(matches!(event.message, AppMessage::FriendRequest(_)));
    assert_eq!(event.sender, bob.public_key().to_hex());
    assert!(alice.router().friends().await?.is_empty());

    // bob ends up with alice's profile from the automatic reply
    let alice_key = alice.public_key();
    bob.wait_for(WAIT, |router| async move {
        matches!(
            router.user_info(&alice_key).await,
            Ok(Some(record)) if record.get("name").and_then(|n| n.as_str()) == Some("alice")
        )
    })
    .await?;

    let profile = bob.router().user_info(&alice_key).await?.unwrap();
    assert!(profile.get("privateKey").is_none());

    alice.shutdown().await?;
    bob.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_chat_is_delivered_and_stored() -> anyhow::Result<()> {
    let hub = MemoryHub::new();
    let alice = TestNode::login(&hub, "alice", ALICE).await?;
    let bob = TestNode::login(&hub, "bob", BOB).await?;
    let bob_events = bob.router().on_event();

    let sent = alice.router().send_chat(&bob.public_key(), "hello bob").await?;
    assert_eq!(sent.message.direction, ChatDirection::Sent);

    let event = tokio::time::timeout(WAIT, bob_events.recv_async()).await??;
    assert_eq!(event.kind, "ChatMessage");

    let history = bob.router().messages_with(&alice.public_key()).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message.message, "hello bob");
    assert_eq!(history[0].message.timestamp, sent.message.timestamp);
    assert_eq!(history[0].message.direction, ChatDirection::Received);

    let own = alice.router().messages_with(&bob.public_key()).await?;
    assert_eq!(own, vec![sent]);

    alice.shutdown().await?;
    bob.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_profile_update_reaches_friends() -> anyhow::Result<()> {
    let hub = MemoryHub::new();
    let alice = TestNode::login(&hub, "alice", ALICE).await?;
    let bob = TestNode::login(&hub, "bob", BOB).await?;

    alice.router().send_friend_request(&bob.public_key()).await?;

    let mut fields = ::common::storage::Record::new();
    fields.insert("status".to_string(), "away".into());
    alice.router().update_profile(fields).await?;

    let alice_key = alice.public_key();
    bob.wait_for(WAIT, |router| async move {
        matches!(
            router.user_info(&alice_key).await,
            Ok(Some(record)) if record.get("status").and_then(|s| s.as_str()) == Some("away")
        )
    })
    .await?;

    alice.shutdown().await?;
    bob.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_restored_backup_keeps_node_reachable() -> anyhow::Result<()> {
    let hub = MemoryHub::new();
    let alice = TestNode::login(&hub, "alice", ALICE).await?;
    let carol = TestNode::login(&hub, "carol", &"33".repeat(32)).await?;

    // a backup taken under bob's key
    let mut snapshot = ::common::storage::Snapshot::default();
    let mut login = ::common::storage::Record::new();
    login.insert("key".to_string(), 0.into());
    login.insert("privateKey".to_string(), BOB.into());
    login.insert("name".to_string(), "alice".into());
    snapshot
        .tables
        .insert(::common::storage::Table::LoggedInUserInfo, vec![login]);
    alice.router().import_snapshot(snapshot).await?;

    let advertised = alice.router().local_public_profile().await?;
    assert_eq!(advertised.key, alice.public_key().to_hex());

    let target = ::common::crypto::PublicKey::from_hex(&advertised.key)?;
    carol.router().send_friend_request(&target).await?;

    let alice_key = alice.public_key();
    carol
        .wait_for(WAIT, |router| async move {
            matches!(
                router.user_info(&alice_key).await,
                Ok(Some(record)) if record.get("name").and_then(|n| n.as_str()) == Some("alice")
            )
        })
        .await?;

    alice.shutdown().await?;
    carol.shutdown().await?;
    Ok(())
}
