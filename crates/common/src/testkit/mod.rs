/// In-process harness for multi-node tests
///
/// A [`MemoryHub`] stands in for the network: transports attached to it
/// seal and open real envelopes, but delivery is a function call. Nodes
/// built on it run the same messenger and router code as the daemon.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{MemoryHub, TestNode};
///
/// #[tokio::test]
/// async fn test_chat() -> anyhow::Result<()> {
///     let hub = MemoryHub::new();
///     let alice = TestNode::login(&hub, "alice", &"11".repeat(32)).await?;
///     let bob = TestNode::login(&hub, "bob", &"22".repeat(32)).await?;
///
///     alice.router().send_chat(&bob.public_key(), "hi").await?;
///
///     alice.shutdown().await?;
///     bob.shutdown().await?;
///     Ok(())
/// }
/// ```
mod hub;
mod node;

pub use hub::{MemoryHub, MemoryTransport};
pub use node::TestNode;
