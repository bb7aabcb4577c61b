//! GeoIP Provider 抽象层
//!
//! 三个适配器都实现 [`GeoIpLookup`]，HTTP 层对其做泛型，
//! 因此路由、错误响应、日志只写一份。

use async_trait::async_trait;
use serde::Deserialize;

use super::record::GeoRecord;
use crate::errors::Result;

/// 查询参数（`?ip=...&lang=...`）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQuery {
    pub ip: Option<String>,
    pub lang: Option<String>,
}

impl LookupQuery {
    pub fn for_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            lang: None,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

/// GeoIP 查询 trait
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    /// 查询并转换为统一结构
    async fn lookup(&self, query: &LookupQuery) -> Result<GeoRecord>;

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}
