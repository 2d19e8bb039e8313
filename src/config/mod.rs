//! Configuration module
//!
//! Loads hub settings from an optional TOML file.

mod hub;

pub use hub::*;
