use anyhow::Result;
use clap::Parser;
use tracing::info;

use geoip_bridge::cli::Cli;
use geoip_bridge::config::init_config;
use geoip_bridge::runtime::modes::run_server;
use geoip_bridge::system::init_logging;

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env 中的 ALLOWED_DOMAINS / IPGEOLOCATION_API_KEY 需要在加载配置前生效
    dotenvy::dotenv().ok();

    let config = init_config(cli.config.as_deref());

    let _guard = init_logging(&config.logging)?;
    info!(
        "geoip-bridge v{} starting with {} workers",
        env!("CARGO_PKG_VERSION"),
        config.server.cpu_count
    );

    run_server(&config).await
}
