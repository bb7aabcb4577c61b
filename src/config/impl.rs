use std::sync::{Arc, OnceLock};

use super::StaticConfig;

static CONFIG: OnceLock<Arc<StaticConfig>> = OnceLock::new();

/// Initialize the global configuration
///
/// Loads configuration from `path` (default "config.toml") plus environment
/// variables. If the file doesn't exist, uses in-memory defaults. Later calls
/// return the first result and ignore `path`.
///
/// # Examples
/// ```no_run
/// use geoip_bridge::config::init_config;
/// let config = init_config(None);
/// println!("listening on {}:{}", config.server.host, config.server.port);
/// ```
pub fn init_config(path: Option<&str>) -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| {
            Arc::new(StaticConfig::load(
                path.unwrap_or(super::DEFAULT_CONFIG_PATH),
            ))
        })
        .clone()
}
