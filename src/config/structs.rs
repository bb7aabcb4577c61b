use serde::{Deserialize, Serialize};

use crate::services::geoip::cloudflare::DEFAULT_TRACE_URL;
use crate::services::geoip::http::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::services::geoip::ipgeolocation::DEFAULT_IPGEO_URL;
use crate::services::geoip::maxmind::{DEFAULT_ASN_DB_PATH, DEFAULT_CITY_DB_PATH};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 旧版部署使用的环境变量（无前缀），优先级最高
pub const ENV_ALLOWED_DOMAINS: &str = "ALLOWED_DOMAINS";
pub const ENV_IPGEOLOCATION_API_KEY: &str = "IPGEOLOCATION_API_KEY";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 服务器地址、端口、worker 数量
/// - access: Referer 白名单
/// - providers: 上游地址、API Key、超时
/// - maxmind: 本地数据库路径
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub maxmind: MaxMindConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ALLOWED_DOMAINS / IPGEOLOCATION_API_KEY > GB__* ENV > config.toml > 默认值
    /// ENV 前缀：GB，分隔符：__
    /// 示例：GB__SERVER__PORT=9999
    pub fn load(path: &str) -> Self {
        let mut config = Self::load_layers(path);
        config.apply_legacy_env(|key| std::env::var(key).ok());
        config
    }

    fn load_layers(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 GB，分隔符 __
            .add_source(
                Environment::with_prefix("GB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 兼容无前缀的环境变量
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domains) = lookup(ENV_ALLOWED_DOMAINS) {
            self.access.allowed_domains = domains;
        }
        if let Some(keys) = lookup(ENV_IPGEOLOCATION_API_KEY) {
            self.providers.ipgeolocation_api_key = keys;
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// Referer 白名单（逗号分隔，`localhost` 总是允许）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub allowed_domains: String,
}

/// 上游数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// 逗号分隔的 ipgeolocation.io API Key
    #[serde(default)]
    pub ipgeolocation_api_key: String,
    #[serde(default = "default_ipgeolocation_url")]
    pub ipgeolocation_url: String,
    #[serde(default = "default_cloudflare_trace_url")]
    pub cloudflare_trace_url: String,
    /// 上游请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// MaxMind 数据库路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxMindConfig {
    #[serde(default = "default_city_db_path")]
    pub city_db_path: String,
    #[serde(default = "default_asn_db_path")]
    pub asn_db_path: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_ipgeolocation_url() -> String {
    DEFAULT_IPGEO_URL.to_string()
}

fn default_cloudflare_trace_url() -> String {
    DEFAULT_TRACE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_city_db_path() -> String {
    DEFAULT_CITY_DB_PATH.to_string()
}

fn default_asn_db_path() -> String {
    DEFAULT_ASN_DB_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ipgeolocation_api_key: String::new(),
            ipgeolocation_url: default_ipgeolocation_url(),
            cloudflare_trace_url: default_cloudflare_trace_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MaxMindConfig {
    fn default() -> Self {
        Self {
            city_db_path: default_city_db_path(),
            asn_db_path: default_asn_db_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
