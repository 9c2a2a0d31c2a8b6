//! Request/response exchange and event tail over the compositor socket.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use super::frame::Frame;
use super::message::{CommandReply, CommandType, Event, EventKind, TreeNode};
use super::IpcError;

/// One connection to the compositor.
///
/// Reads are buffered internally, so [`IpcClient::next_event`] is cancel-safe
/// and can sit in a `tokio::select!` next to a timer without losing bytes of a
/// partially received frame.
pub struct IpcClient<S = UnixStream> {
    stream: S,
    buf: Vec<u8>,
}

impl IpcClient<UnixStream> {
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| IpcError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Connected to compositor IPC at {}", path.display());
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> IpcClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(4096),
        }
    }

    /// Sends a request and waits for the complete reply frame.
    pub async fn send_command(&mut self, kind: u32, payload: &[u8]) -> Result<Frame, IpcError> {
        self.write_frame(&Frame::new(kind, payload)).await?;
        let reply = self.read_frame().await?;
        if reply.kind != kind {
            return Err(IpcError::UnexpectedReply {
                expected: kind,
                got: reply.kind,
            });
        }
        Ok(reply)
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), IpcError> {
        let bytes = frame.encode()?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(kind = frame.kind, len = frame.payload.len(), "IPC frame sent");
        Ok(())
    }

    /// Reads the next frame, looping over partial reads.
    pub async fn read_frame(&mut self) -> Result<Frame, IpcError> {
        loop {
            if let Some((frame, used)) = Frame::decode(&self.buf)? {
                self.buf.drain(..used);
                trace!(kind = frame.kind, len = frame.payload.len(), "IPC frame received");
                return Ok(frame);
            }
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Err(IpcError::Disconnected);
            }
        }
    }

    pub async fn get_tree(&mut self) -> Result<TreeNode, IpcError> {
        let reply = self.send_command(CommandType::GetTree.code(), &[]).await?;
        Ok(serde_json::from_slice(&reply.payload)?)
    }

    /// Subscribes to `kinds`; afterwards the connection only carries events.
    pub async fn subscribe(&mut self, kinds: &[EventKind]) -> Result<(), IpcError> {
        let names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
        let payload = serde_json::to_vec(&names)?;
        let reply = self
            .send_command(CommandType::Subscribe.code(), &payload)
            .await?;

        let ack: CommandReply = serde_json::from_slice(&reply.payload)?;
        if !ack.success {
            return Err(IpcError::Rejected(
                ack.error.unwrap_or_else(|| "subscribe".to_string()),
            ));
        }
        debug!("Subscribed to {:?}", names);
        Ok(())
    }

    /// Next pushed event, in wire order.
    pub async fn next_event(&mut self) -> Result<Event, IpcError> {
        let frame = self.read_frame().await?;
        match EventKind::from_frame_type(frame.kind) {
            Some(EventKind::Window) => Ok(Event::Window(serde_json::from_slice(&frame.payload)?)),
            Some(EventKind::Shutdown) => Ok(Event::Shutdown),
            None => Ok(Event::Other(frame.kind)),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
