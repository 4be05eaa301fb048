pub mod handler;
pub mod manager;
pub mod state;

pub use handler::Session;
pub use manager::{SessionManager, SessionSummary};
pub use state::{SessionConfig, SessionState, StateError};
