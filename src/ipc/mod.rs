//! Compositor IPC: framing, client and payload types.
//!
//! This module provides:
//! - `frame`: the fixed-header wire codec
//! - `client`: blocking request/response exchange and the event tail
//! - `message`: typed tree, event and reply payloads

pub mod client;
pub mod frame;
pub mod message;

use std::path::PathBuf;

pub use client::IpcClient;
pub use frame::{Frame, FrameHeader, EVENT_FLAG, HEADER_LEN, MAGIC};
pub use message::{
    CommandType, Event, EventKind, FocusChange, TreeNode, WindowEvent, WindowInfo,
};

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("SWAYSOCK env var not defined")]
    SocketPathMissing,

    #[error("Unable to connect to {path:?}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC peer disconnected")]
    Disconnected,

    #[error("invalid IPC magic {0:?}")]
    BadMagic([u8; 6]),

    #[error("IPC payload of {0} bytes exceeds limit")]
    Oversized(u32),

    #[error("unexpected IPC reply type {got}, expected {expected}")]
    UnexpectedReply { expected: u32, got: u32 },

    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ipc request failed: {0}")]
    Rejected(String),
}
