//! Application lifecycle
//!
//! - `lifetime::startup`: builds providers from the static config and kicks
//!   off the one-time MaxMind load
//! - `modes::server`: binds and runs the HTTP server

pub mod lifetime;
pub mod modes;
