//! Pure Rust async implementation of the [Source RCON protocol](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol).
pub mod client;
pub mod config;
mod deadline;
pub mod error;
pub mod packet;

pub use client::{Client, SessionState};
pub use config::Config;
pub use error::RconError;
