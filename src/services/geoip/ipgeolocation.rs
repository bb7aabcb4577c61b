//! ipgeolocation.io 数据源
//!
//! 支持逗号分隔的多个 API Key，每次请求随机挑一个，用来分摊额度。

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use super::http::{HttpFetcher, fetch_text};
use super::provider::{GeoIpLookup, LookupQuery};
use super::record::{Coordinate, GeoRecord, NOT_AVAILABLE, coordinate_or_na, or_na};
use crate::errors::{GeoError, Result};
use crate::utils::require_ip;

pub const DEFAULT_IPGEO_URL: &str = "https://api.ipgeolocation.io/ipgeo";

/// 上游返回的 JSON（只取用到的字段）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpGeolocationPayload {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub state_prov: Option<String>,
    pub country_code2: Option<String>,
    pub country_name: Option<String>,
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    pub isp: Option<String>,
    pub organization: Option<String>,
    pub zipcode: Option<String>,
    pub time_zone: Option<TimeZone>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeZone {
    pub name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// ASN 推导规则
///
/// - ISP 中包含 `"AS"`：取 ISP 的第一个空白分隔词
/// - 否则有组织名：`"AS" + organization`
/// - 否则 `"N/A"`
pub fn derive_asn(isp: Option<&str>, organization: Option<&str>) -> String {
    let isp = isp.filter(|v| !v.is_empty());
    let organization = organization.filter(|v| !v.is_empty());

    if let Some(isp) = isp
        && isp.contains("AS")
    {
        return isp.split_whitespace().next().unwrap_or(isp).to_string();
    }

    match organization {
        Some(org) => format!("AS{}", org),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// ipgeolocation.io JSON → 统一结构
pub fn normalize_ipgeolocation(payload: &IpGeolocationPayload) -> GeoRecord {
    let isp = non_empty(&payload.isp);
    let organization = non_empty(&payload.organization);
    let country_code = or_na(payload.country_code2.as_deref());

    GeoRecord {
        ip: or_na(payload.ip.as_deref()),
        city: or_na(payload.city.as_deref()),
        region: or_na(payload.state_prov.as_deref()),
        country: country_code.clone(),
        country_name: or_na(payload.country_name.as_deref()),
        country_code,
        latitude: coordinate_or_na(payload.latitude.clone()),
        longitude: coordinate_or_na(payload.longitude.clone()),
        asn: derive_asn(isp, organization),
        org: or_na(isp.or(organization)),
        isp: Some(or_na(isp)),
        postal: Some(or_na(payload.zipcode.as_deref())),
        timezone: Some(or_na(
            payload.time_zone.as_ref().and_then(|tz| tz.name.as_deref()),
        )),
        note: None,
    }
}

/// API Key 池
#[derive(Debug, Clone, Default)]
pub struct ApiKeyPool {
    raw_configured: bool,
    keys: Vec<String>,
}

impl ApiKeyPool {
    /// 解析逗号分隔的 key 列表，去掉空白项
    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        Self {
            raw_configured: !raw.is_empty(),
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 随机选一个 key（均匀分布）
    pub fn choose(&self) -> Result<&str> {
        if !self.raw_configured {
            return Err(GeoError::configuration("API key not configured"));
        }
        if self.keys.is_empty() {
            return Err(GeoError::configuration("No valid API key found"));
        }

        let idx = rand::random_range(0..self.keys.len());
        Ok(&self.keys[idx])
    }
}

/// 构造请求地址：`<base>?apiKey=<key>&ip=<ip>`
pub fn build_request_url(base: &str, api_key: &str, ip: &str) -> Result<String> {
    let url = Url::parse_with_params(base, &[("apiKey", api_key), ("ip", ip)]).map_err(|e| {
        GeoError::configuration(format!("Invalid ipgeolocation.io URL '{}': {}", base, e))
    })?;
    Ok(url.into())
}

/// 发起请求并解析
pub async fn fetch_ipgeolocation(
    fetcher: Arc<dyn HttpFetcher>,
    base_url: &str,
    api_key: &str,
    ip: &str,
) -> Result<GeoRecord> {
    let url = build_request_url(base_url, api_key, ip)?;
    let body = fetch_text(fetcher, url).await?;

    let payload: IpGeolocationPayload = serde_json::from_str(&body).map_err(|e| {
        debug!("ipgeolocation.io response parse failed: {}", e);
        GeoError::upstream("Error parsing JSON")
    })?;

    trace!("ipgeolocation.io payload: {:?}", payload);
    Ok(normalize_ipgeolocation(&payload))
}

pub struct IpGeolocationIo {
    base_url: String,
    keys: ApiKeyPool,
    fetcher: Arc<dyn HttpFetcher>,
}

impl IpGeolocationIo {
    pub fn new(
        base_url: impl Into<String>,
        keys: ApiKeyPool,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            keys,
            fetcher,
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    async fn query(&self, ip: IpAddr) -> Result<GeoRecord> {
        let key = self.keys.choose()?;
        fetch_ipgeolocation(self.fetcher.clone(), &self.base_url, key, &ip.to_string()).await
    }
}

#[async_trait]
impl GeoIpLookup for IpGeolocationIo {
    async fn lookup(&self, query: &LookupQuery) -> Result<GeoRecord> {
        let ip = require_ip(query.ip())?;
        self.query(ip).await
    }

    fn name(&self) -> &'static str {
        "IPGeolocation.io"
    }
}
