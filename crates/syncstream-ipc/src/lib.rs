//! Control socket for syncstreamd.
//!
//! Requests and events travel as newline-delimited JSON over a Unix socket.
//! Peers running as root or as the daemon's own user may change the catalog;
//! everyone else is an observer.

mod client;
mod server;

pub use client::*;
pub use server::*;

use syncstream_api::ErrorInfo;
use syncstream_util::ClientId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Reply to request {got} arrived while waiting for {expected}")]
    ResponseMismatch { expected: u64, got: u64 },

    #[error("Daemon rejected the request ({:?}): {}", .0.code, .0.message)]
    Rejected(ErrorInfo),

    #[error("Server socket is not bound")]
    NotStarted,

    #[error("No connected client {0}")]
    UnknownClient(ClientId),
}

pub type IpcResult<T> = Result<T, IpcError>;
