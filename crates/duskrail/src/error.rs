//! Per-module error taxonomy (spec §7), expressed as `thiserror` enums
//! rather than one crate-wide error type, matching the teacher's
//! per-module error pattern.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors surfaced from `Session::send`/`Session::receive`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("socket error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("session is closed")]
    Closed,

    #[error("reassembled message failed hash verification")]
    Corrupt,

    #[error(transparent)]
    Crypto(#[from] duskrail_core::crypto::CryptoError),

    #[error(transparent)]
    Compression(#[from] duskrail_core::compress::CompressionError),
}

/// Errors from `dial`.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("socket error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("timed out waiting for a handshake reply")]
    Timeout,

    #[error("listener rejected the handshake token")]
    TokenRejected,

    #[error("unexpected frame for handshake state: wanted {wanted}, got {got:?}")]
    UnexpectedFrame {
        wanted: &'static str,
        got: Option<duskrail_core::wire::Type>,
    },

    #[error(transparent)]
    Wire(#[from] duskrail_core::wire::WireError),

    #[error(transparent)]
    Crypto(#[from] duskrail_core::crypto::CryptoError),
}

/// Fatal errors from `listen`.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),
}
