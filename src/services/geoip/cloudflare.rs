//! Cloudflare trace 数据源
//!
//! `/cdn-cgi/trace` 只能报告请求方自己的 IP，`ip` 参数仅做格式校验，
//! 不会改变查询对象。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::http::{HttpFetcher, fetch_text};
use super::provider::{GeoIpLookup, LookupQuery};
use super::record::{Coordinate, GeoRecord, NOT_AVAILABLE, or_na};
use crate::errors::{GeoError, Result};
use crate::utils::validate_optional_ip;

pub const DEFAULT_TRACE_URL: &str = "https://1.1.1.1/cdn-cgi/trace";

pub const TRACE_NOTE: &str = "Cloudflare trace provides limited geolocation data";

/// 解析 `key=value` 文本
///
/// 每行按 `=` 切分，取前两段；key 或 value 为空的行被忽略。
pub fn parse_trace(text: &str) -> HashMap<String, String> {
    text.trim()
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('=');
            let key = parts.next()?.trim();
            let value = parts.next()?.trim();
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// trace 数据 → 统一结构
pub fn normalize_trace(trace: &HashMap<String, String>) -> GeoRecord {
    // loc 是两位国家代码，不是国家名称；这里原样填进 country_name
    let loc = or_na(trace.get("loc"));
    let org = trace
        .get("colo")
        .filter(|colo| !colo.is_empty())
        .map(|colo| format!("Cloudflare {}", colo))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    GeoRecord {
        ip: or_na(trace.get("ip")),
        city: NOT_AVAILABLE.to_string(),
        region: NOT_AVAILABLE.to_string(),
        country: loc.clone(),
        country_name: loc.clone(),
        country_code: loc,
        latitude: Coordinate::not_available(),
        longitude: Coordinate::not_available(),
        asn: NOT_AVAILABLE.to_string(),
        org,
        isp: None,
        postal: None,
        timezone: None,
        note: Some(TRACE_NOTE.to_string()),
    }
}

pub struct CloudflareTrace {
    trace_url: String,
    fetcher: Arc<dyn HttpFetcher>,
}

impl CloudflareTrace {
    pub fn new(trace_url: impl Into<String>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            trace_url: trace_url.into(),
            fetcher,
        }
    }

    /// 拉取 trace 并转换
    pub async fn fetch(&self) -> Result<GeoRecord> {
        let body = fetch_text(self.fetcher.clone(), self.trace_url.clone()).await?;
        let trace = parse_trace(&body);
        if trace.is_empty() {
            debug!("Cloudflare trace body had no key=value pairs");
            return Err(GeoError::upstream("Error parsing trace data"));
        }

        trace!("Cloudflare trace parsed: {:?}", trace);
        Ok(normalize_trace(&trace))
    }
}

#[async_trait]
impl GeoIpLookup for CloudflareTrace {
    async fn lookup(&self, query: &LookupQuery) -> Result<GeoRecord> {
        validate_optional_ip(query.ip())?;
        self.fetch().await
    }

    fn name(&self) -> &'static str {
        "Cloudflare"
    }
}
