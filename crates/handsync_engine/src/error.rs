//! Error types for the sync engine.

use crate::session::SessionState;
use handsync_codec::{CodecError, ControlKind, TransportError, WireError};
use handsync_protocol::SchemaError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync session.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Socket setup or I/O failed, or the peer closed the connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame or payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Item data did not match its parameter format.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A control frame other than the expected one arrived.
    #[error("expected {expected} control frame, got {actual}")]
    UnexpectedControl {
        /// Control frame the exchange required.
        expected: ControlKind,
        /// What arrived instead.
        actual: String,
    },

    /// A message other than the expected one arrived.
    #[error("expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Message the exchange required.
        expected: &'static str,
        /// What arrived instead.
        actual: String,
    },

    /// The operation is not allowed in the current session state.
    #[error("{operation} is not allowed in state {state:?}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// No connection to the device is open.
    #[error("not connected to device")]
    NotConnected,
}

impl From<WireError> for SyncError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Transport(e) => Self::Transport(e),
            WireError::Codec(e) => Self::Codec(e),
        }
    }
}

impl SyncError {
    /// Builds an [`SyncError::UnexpectedMessage`] from whatever arrived.
    pub fn unexpected(expected: &'static str, actual: impl ToString) -> Self {
        Self::UnexpectedMessage {
            expected,
            actual: actual.to_string(),
        }
    }

    /// Stable negative code per error class.
    pub fn code(&self) -> i32 {
        match self {
            SyncError::Transport(_) => -1,
            SyncError::Codec(_) => -2,
            SyncError::Schema(_) => -3,
            SyncError::UnexpectedControl { .. } => -4,
            SyncError::UnexpectedMessage { .. } => -5,
            SyncError::InvalidState { .. } => -6,
            SyncError::NotConnected => -7,
        }
    }

    /// Returns true if the connection can no longer be trusted.
    ///
    /// Transport and codec failures leave the stream at an unknown offset;
    /// the session must be finalized.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Codec(_))
    }

    /// Returns true if the device closed the connection.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, SyncError::Transport(e) if e.is_peer_closed())
    }
}
