//! Errors surfaced to clients at the per-frame boundary

use crate::codec::CodecError;
use crate::mask::BoundsError;
use crate::protocol::{ErrorCode, ProtocolError, ServerMessage};
use crate::session::StateError;
use crate::solver::SolverError;
use thiserror::Error;

/// Any failure while handling one client frame
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl SegmentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SegmentError::Protocol(_) => ErrorCode::ProtocolError,
            SegmentError::State(_) => ErrorCode::StateError,
            SegmentError::Codec(_) => ErrorCode::CodecError,
            SegmentError::Bounds(_) => ErrorCode::BoundsError,
            SegmentError::Solver(_) => ErrorCode::SolverError,
        }
    }

    /// Structured error response for the originating connection
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}
