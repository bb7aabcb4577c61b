use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use tracing::{debug, info, warn};

use crate::api::middleware::RefererGuard;
use crate::api::services::{AppStartTime, health_routes, lookup_routes};
use crate::config::StaticConfig;
use crate::services::geoip::{HttpFetcher, UreqFetcher};
use crate::services::{AllowList, ApiKeyPool, CloudflareTrace, IpGeolocationIo, MaxMindProvider};

/// 服务运行所需的全部共享对象
///
/// 所有字段在启动后只读；`web::Data` 内部是 Arc，clone 很便宜。
#[derive(Clone)]
pub struct StartupContext {
    pub allow_list: Arc<AllowList>,
    pub cloudflare: web::Data<CloudflareTrace>,
    pub ipgeolocation: web::Data<IpGeolocationIo>,
    pub maxmind: web::Data<MaxMindProvider>,
    pub app_start_time: web::Data<AppStartTime>,
}

impl StartupContext {
    /// 根据配置构建各个 provider（MaxMind 处于未加载状态）
    pub fn from_config(config: &StaticConfig) -> Self {
        let timeout = Duration::from_secs(config.providers.timeout_secs);
        Self::with_fetcher(config, Arc::new(UreqFetcher::new(timeout)))
    }

    /// 与 `from_config` 相同，但使用指定的 HTTP 实现
    pub fn with_fetcher(config: &StaticConfig, fetcher: Arc<dyn HttpFetcher>) -> Self {
        let allow_list = AllowList::from_csv(&config.access.allowed_domains);
        let keys = ApiKeyPool::parse(&config.providers.ipgeolocation_api_key);

        Self {
            allow_list: Arc::new(allow_list),
            cloudflare: web::Data::new(CloudflareTrace::new(
                config.providers.cloudflare_trace_url.clone(),
                fetcher.clone(),
            )),
            ipgeolocation: web::Data::new(IpGeolocationIo::new(
                config.providers.ipgeolocation_url.clone(),
                keys,
                fetcher,
            )),
            maxmind: web::Data::new(MaxMindProvider::new(
                config.maxmind.city_db_path.clone(),
                config.maxmind.asn_db_path.clone(),
            )),
            app_start_time: web::Data::new(AppStartTime::now()),
        }
    }

    /// 注册共享数据与路由，服务器与测试共用
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.cloudflare.clone())
            .app_data(self.ipgeolocation.clone())
            .app_data(self.maxmind.clone())
            .app_data(self.app_start_time.clone())
            .service(
                web::scope("/api")
                    .wrap(RefererGuard::new(self.allow_list.clone()))
                    .service(lookup_routes()),
            )
            .service(web::scope("/health").service(health_routes()));
    }
}

/// 准备服务器启动的上下文
///
/// MaxMind 数据库在后台加载一次，加载完成前 `/api/maxmind` 返回 503。
pub fn prepare_server_startup(config: &StaticConfig) -> StartupContext {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let ctx = StartupContext::from_config(config);

    info!("Allowed referer hosts: {:?}", ctx.allow_list.hosts());

    match ctx.ipgeolocation.key_count() {
        0 => warn!("No ipgeolocation.io API key configured, /api/ipgeolocation-io will return 500"),
        n => info!("ipgeolocation.io key pool size: {}", n),
    }

    let maxmind = ctx.maxmind.clone();
    actix_web::rt::spawn(async move {
        maxmind.initialize().await;
    });

    debug!("Pre-startup processing completed in {:?}", start_time.elapsed());
    ctx
}
