// Error taxonomy for the lockstep core.
//
// The split follows how failures propagate: `Bind`/`Connect` are fatal to
// starting a role and surface from the constructors; `SessionIo` is local to
// one session (that session dies, the rest keep playing); codec errors carry
// their own recoverable-vs-fatal classification (see
// `warfront_protocol::codec`). A stalled barrier is deliberately *not* here —
// waiting on a slow peer is an observable engine state, not a failure.

use std::io;

use thiserror::Error;
use warfront_protocol::CodecError;

pub type NetResult<T> = Result<T, NetError>;

/// Failures surfaced by the connection manager and synchronization engine.
#[derive(Debug, Error)]
pub enum NetError {
    /// Could not bind the host listener. Fatal to the host role.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),

    /// Could not reach the host. Fatal to the join role.
    #[error("failed to connect to host: {0}")]
    Connect(#[source] io::Error),

    /// I/O failure on an established session.
    #[error("session i/o failed: {0}")]
    SessionIo(#[source] io::Error),

    /// The host refused the handshake, e.g. with "server full".
    #[error("rejected by host: {0}")]
    Rejected(String),

    /// The host answered the handshake with something other than the
    /// expected message kind.
    #[error("handshake protocol violation: expected {expected}, got {got}")]
    Handshake { expected: &'static str, got: String },

    /// A local submit was attempted without holding a seat.
    #[error("local peer holds no seat")]
    NoSeat,

    /// Encoding or decoding a wire message failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
