use actix_web::{HttpResponse, web};
use tracing::{debug, error, trace};

use crate::errors::GeoError;
use crate::services::{
    CloudflareTrace, GeoIpLookup, IpGeolocationIo, LookupQuery, MaxMindProvider,
};

pub struct LookupService;

impl LookupService {
    /// 所有数据源共用的处理函数
    ///
    /// 成功返回 200 + 统一结构；失败由 `GeoError` 转成 `{"error": ...}`
    pub async fn lookup<P>(
        query: web::Query<LookupQuery>,
        provider: web::Data<P>,
    ) -> Result<HttpResponse, GeoError>
    where
        P: GeoIpLookup + 'static,
    {
        let query = query.into_inner();
        trace!("{} lookup request: {:?}", provider.name(), query);

        match provider.lookup(&query).await {
            Ok(record) => {
                debug!("{} lookup succeeded for {}", provider.name(), record.ip);
                Ok(HttpResponse::Ok().json(record))
            }
            Err(e) => {
                if e.is_client_error() {
                    debug!("{} lookup rejected: {}", provider.name(), e);
                } else {
                    error!("{} lookup failed [{}]: {}", provider.name(), e.code(), e);
                }
                Err(e)
            }
        }
    }
}

/// 查询路由（挂在 `/api` 下，由 RefererGuard 保护）
pub fn lookup_routes() -> actix_web::Scope {
    web::scope("")
        .route(
            "/cloudflare-ip",
            web::get().to(LookupService::lookup::<CloudflareTrace>),
        )
        .route(
            "/ipgeolocation-io",
            web::get().to(LookupService::lookup::<IpGeolocationIo>),
        )
        .route(
            "/maxmind",
            web::get().to(LookupService::lookup::<MaxMindProvider>),
        )
}
