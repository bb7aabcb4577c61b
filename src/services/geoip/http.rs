//! 上游 HTTP 访问
//!
//! ureq 是同步客户端，适配器通过 [`fetch_text`] 在 blocking 线程池中调用。
//! 每个请求只发一次，不重试。

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};
use ureq::Agent;

use crate::errors::{GeoError, Result};

/// 默认 HTTP 请求超时时间
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// 发起一次 GET 并返回响应正文
///
/// 非 2xx 状态视为错误。
pub trait HttpFetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String>;
}

/// 基于 ureq 的实现（Agent 内部是 Arc，可跨线程共享）
pub struct UreqFetcher {
    agent: Agent,
}

impl UreqFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }
}

impl HttpFetcher for UreqFetcher {
    fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.agent.get(url).call().map_err(|e| {
            warn!("Upstream request failed: {}", e);
            GeoError::from(e)
        })?;

        trace!("Upstream responded with status {}", resp.status());

        resp.into_body()
            .read_to_string()
            .map_err(|e| GeoError::upstream(e.to_string()))
    }
}

/// 在 spawn_blocking 中执行同步请求
pub async fn fetch_text(fetcher: Arc<dyn HttpFetcher>, url: String) -> Result<String> {
    tokio::task::spawn_blocking(move || fetcher.get_text(&url)).await?
}
