//! Wire framing shared by requests, replies and events.
//!
//! Layout: `[6-byte magic][u32 length][u32 type][payload]`, integers in host
//! byte order.

use super::IpcError;

pub const MAGIC: [u8; 6] = *b"i3-ipc";

/// Size of the fixed header preceding every payload.
pub const HEADER_LEN: usize = MAGIC.len() + 8;

/// Event frames pushed by the compositor carry this bit in their type.
pub const EVENT_FLAG: u32 = 1 << 31;

/// Upper bound on an accepted payload; anything larger is treated as a
/// corrupted stream.
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: u32,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..MAGIC.len()].copy_from_slice(&MAGIC);
        out[MAGIC.len()..MAGIC.len() + 4].copy_from_slice(&self.length.to_ne_bytes());
        out[MAGIC.len() + 4..].copy_from_slice(&self.kind.to_ne_bytes());
        out
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, IpcError> {
        let mut magic = [0u8; MAGIC.len()];
        magic.copy_from_slice(&buf[..MAGIC.len()]);
        if magic != MAGIC {
            return Err(IpcError::BadMagic(magic));
        }

        let mut word = [0u8; 4];
        word.copy_from_slice(&buf[MAGIC.len()..MAGIC.len() + 4]);
        let length = u32::from_ne_bytes(word);
        word.copy_from_slice(&buf[MAGIC.len() + 4..]);
        let kind = u32::from_ne_bytes(word);

        if length > MAX_PAYLOAD_LEN {
            return Err(IpcError::Oversized(length));
        }
        Ok(Self { length, kind })
    }

    pub fn is_event(&self) -> bool {
        self.kind & EVENT_FLAG != 0
    }
}

/// A complete message: request, reply or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn header(&self) -> Result<FrameHeader, IpcError> {
        let length = u32::try_from(self.payload.len())
            .ok()
            .filter(|len| *len <= MAX_PAYLOAD_LEN)
            .ok_or(IpcError::Oversized(u32::MAX))?;
        Ok(FrameHeader {
            length,
            kind: self.kind,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        let header = self.header()?;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` while the buffer holds less than a full frame, and
    /// otherwise the frame plus the number of bytes it occupied.
    pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, IpcError> {
        let Some(head) = buf.get(..HEADER_LEN) else {
            return Ok(None);
        };
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(head);
        let header = FrameHeader::decode(&raw)?;

        let total = HEADER_LEN + header.length as usize;
        let Some(payload) = buf.get(HEADER_LEN..total) else {
            return Ok(None);
        };
        Ok(Some((Frame::new(header.kind, payload), total)))
    }

    pub fn is_event(&self) -> bool {
        self.kind & EVENT_FLAG != 0
    }

    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
