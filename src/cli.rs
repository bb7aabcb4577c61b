//! Command-line interface definitions using clap

use clap::Parser;

/// geoip-bridge - normalized IP geolocation endpoints
#[derive(Debug, Parser)]
#[command(name = "geoip-bridge")]
#[command(version)]
#[command(about = "Normalized IP geolocation endpoints", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<String>,
}
