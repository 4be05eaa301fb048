//! Wire protocol: validated client frames and server responses

mod messages;

pub use messages::*;
