//! Interactive segmentation server library
//!
//! This module exports the server components for use in integration tests,
//! benches and the binary.

pub mod codec;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod protocol;
pub mod server;
pub mod session;
pub mod solver;

// Re-export commonly used types
pub use error::SegmentError;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::AppState;
pub use session::SessionManager;
pub use solver::{GrabCutSolver, SegmentationSolver, SolverPool};
