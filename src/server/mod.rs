//! WebSocket server module
//!
//! Accepts WebSocket connections and runs one receive loop per client, relaying
//! text messages through the hub.

mod handler;
mod protocol;
mod websocket;

pub use handler::*;
pub use protocol::*;
pub use websocket::*;
