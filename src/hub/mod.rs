//! Connection hub
//!
//! Tracks live client connections and fans text messages out between them.

mod broadcast;
mod connection;
mod registry;

pub use broadcast::*;
pub use connection::*;
pub use registry::*;
