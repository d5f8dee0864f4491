use futures::future::BoxFuture;
use iroh::endpoint::{Connection, RecvStream};
use iroh::protocol::{AcceptError, ProtocolHandler};

use crate::crypto::SecretKey;
use crate::transport::{open_and_forward, InboundSender, TransportKind};

/// ALPN identifier for channel traffic
pub const CHANNEL_ALPN: &[u8] = b"/hexhoot/channel/1";

/// Upper bound on one framed envelope.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    TooLarge(usize),
}

/// `len: u32 BE || payload`
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read the next frame, `None` once the stream has ended.
async fn read_frame(recv: &mut RecvStream) -> Option<Result<Vec<u8>, FrameError>> {
    let mut len = [0u8; 4];
    recv.read_exact(&mut len).await.ok()?;
    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_FRAME_SIZE {
        return Some(Err(FrameError::TooLarge(len)));
    }
    let mut buf = vec![0u8; len];
    recv.read_exact(&mut buf).await.ok()?;
    Some(Ok(buf))
}

/// Accepts connections on a channel's topic endpoint and forwards every
/// envelope that opens under our identity.
#[derive(Debug, Clone)]
pub struct ChannelProtocol {
    identity: SecretKey,
    inbound: InboundSender,
}

impl ChannelProtocol {
    pub fn new(identity: SecretKey, inbound: InboundSender) -> Self {
        Self { identity, inbound }
    }

    async fn drain_stream(&self, mut recv: RecvStream) {
        while let Some(frame) = read_frame(&mut recv).await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    // length prefix is garbage, there is no way to resync
                    tracing::warn!("dropping overlay stream: {}", e);
                    return;
                }
            };
            match open_and_forward(&frame, &self.identity, &self.inbound, TransportKind::Overlay) {
                Ok(sender) => tracing::debug!(%sender, "message received (overlay)"),
                Err(e) => tracing::debug!("dropping overlay frame: {}", e),
            }
        }
    }
}

impl ProtocolHandler for ChannelProtocol {
    #[allow(refining_impl_trait)]
    fn accept(&self, conn: Connection) -> BoxFuture<'static, Result<(), AcceptError>> {
        let this = self.clone();
        Box::pin(async move {
            tracing::debug!("new overlay connection from {:?}", conn.remote_node_id());
            loop {
                let recv = match conn.accept_uni().await {
                    Ok(recv) => recv,
                    Err(e) => {
                        tracing::debug!("overlay connection closed: {}", e);
                        return Ok(());
                    }
                };
                let stream_handler = this.clone();
                tokio::spawn(async move { stream_handler.drain_stream(recv).await });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(b"{}").unwrap();
        assert_eq!(frame, vec![0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn test_encode_frame_rejects_oversized() {
        let payload = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(FrameError::TooLarge(_))
        ));
    }
}
