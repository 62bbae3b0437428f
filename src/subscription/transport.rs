use super::TransportError;
use async_trait::async_trait;

/// Callback fired once when the peer goes away.
pub type DisconnectCallback = Box<dyn FnOnce() + Send + 'static>;

/// Server-to-client push channel for one viewer.
///
/// Implementations wrap whatever the outer layer uses (an SSE response body,
/// a websocket). Frames are complete `data: ...\n\n` or keep-alive frames.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Registers the callback to run when the peer disconnects.
    ///
    /// If the peer is already gone the callback runs immediately.
    fn on_disconnect(&self, callback: DisconnectCallback);
}
