//! geoip-bridge - normalized IP geolocation endpoints
//!
//! Queries Cloudflare trace, ipgeolocation.io or a local MaxMind database and
//! returns every answer in one JSON shape, with `"N/A"` for anything the
//! provider does not know.
//!
//! # Architecture
//! - `services::geoip`: provider adapters and the normalized record
//! - `services::access`: referer allow-list
//! - `api`: HTTP handlers and middleware
//! - `client`: direct-call client for Cloudflare / ipgeolocation.io
//! - `cli`: command-line flags
//! - `config`: configuration management
//! - `runtime`: application lifecycle and server mode
//! - `system`: logging setup

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod system;
pub mod utils;
