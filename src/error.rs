//! # Error Types
//!
//! Two layers of errors:
//!
//! - [`TransportError`]: what the wire (or an in-memory stand-in) reports.
//! - [`ControlError`]: what the connection manager and playback controller
//!   report to their callers. Transport failures are carried through
//!   unchanged via `#[error(transparent)]`.

use std::io;
use thiserror::Error;

/// Failures raised by a [`Transport`](crate::protocol::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket level failure (other than a clean hang-up).
    #[error("i/o error talking to mpd: {0}")]
    Io(#[from] io::Error),

    /// The daemon rejected a command with an `ACK` line.
    #[error("mpd refused `{command}` (code {code}): {message}")]
    Ack {
        code: u32,
        command: String,
        message: String,
    },

    /// The daemon sent something that is not valid protocol.
    #[error("malformed response from mpd: {0}")]
    Protocol(String),

    /// An argument cannot be encoded as a single command line.
    #[error("cannot send argument to mpd: {0}")]
    Argument(String),

    /// The session is gone: peer hung up, or `close`/`disconnect` already ran.
    #[error("connection to mpd is closed")]
    Disconnected,
}

impl TransportError {
    /// True when the error means the session can no longer be used.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Disconnected => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Errors surfaced by [`Connection`](crate::connection::Connection) and
/// [`PlaybackController`](crate::controller::PlaybackController).
#[derive(Debug, Error)]
pub enum ControlError {
    /// Caller passed a value of the wrong shape. Raised before any transport call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection flag is down. Raised before any transport call.
    #[error("mpd client lost the connection")]
    NotConnected,

    /// The transport could not be established at construction time.
    #[error("could not connect to mpd at {host}:{port}")]
    ConnectionFailure {
        host: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The keep-alive thread could not be spawned.
    #[error("failed to spawn keep-alive thread")]
    KeepAlive(#[source] io::Error),
}

impl ControlError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ControlError::InvalidArgument(msg.into())
    }
}

pub type Result<T, E = ControlError> = std::result::Result<T, E>;
