//! MaxMind GeoLite2 数据库实现
//!
//! 使用本地 GeoLite2-City.mmdb 与 GeoLite2-ASN.mmdb 两个文件查询。
//! 数据库在启动时由 [`MaxMindProvider::initialize`] 加载一次，之后只读；
//! 加载完成前（或加载失败后）所有请求都返回 503，不会在请求中重新打开文件。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::OnceLock;

use async_trait::async_trait;
use maxminddb::Reader;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use strum::{AsRefStr, Display, EnumString};
use tracing::{error, info, trace, warn};

use super::provider::{GeoIpLookup, LookupQuery};
use super::record::{Coordinate, GeoRecord, NOT_AVAILABLE, or_na};
use crate::errors::{GeoError, Result};
use crate::utils::require_ip;

pub const DEFAULT_CITY_DB_PATH: &str = "./common/maxmind-db/GeoLite2-City.mmdb";
pub const DEFAULT_ASN_DB_PATH: &str = "./common/maxmind-db/GeoLite2-ASN.mmdb";

const MSG_UNAVAILABLE: &str = "MaxMind database not available";

/// 支持的名称语言，其余取值一律按 `en` 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
pub enum Language {
    #[strum(serialize = "zh-CN")]
    ZhCn,
    #[default]
    #[strum(serialize = "en")]
    En,
    #[strum(serialize = "fr")]
    Fr,
}

impl Language {
    pub fn from_query(lang: Option<&str>) -> Self {
        lang.and_then(|l| l.parse().ok()).unwrap_or_default()
    }
}

/// 多语言名称表（`{"en": "...", "zh-CN": "..."}`）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedPlace {
    #[serde(default)]
    pub names: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryPlace {
    pub iso_code: Option<String>,
    #[serde(default)]
    pub names: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// City 库记录；查不到时为空记录
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityRecord {
    pub city: Option<NamedPlace>,
    #[serde(default)]
    pub subdivisions: Vec<NamedPlace>,
    pub country: Option<CountryPlace>,
    pub location: Option<Location>,
}

/// ASN 库记录；查不到时为空记录
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AsnRecord {
    pub autonomous_system_number: Option<u32>,
    pub autonomous_system_organization: Option<String>,
}

/// 取指定语言的名称，缺失时回落到英文
fn localized(names: &HashMap<String, String>, lang: Language) -> Option<&str> {
    let key: &str = lang.as_ref();
    let fallback: &str = Language::En.as_ref();
    names
        .get(key)
        .filter(|n| !n.is_empty())
        .or_else(|| names.get(fallback))
        .map(String::as_str)
}

/// City + ASN 记录 → 统一结构
pub fn normalize_maxmind(
    ip: &str,
    lang: Language,
    city: &CityRecord,
    asn: &AsnRecord,
) -> GeoRecord {
    let iso_code = or_na(city.country.as_ref().and_then(|c| c.iso_code.as_deref()));
    let location = city.location.as_ref();

    let coordinate = |value: Option<f64>| value.map(Coordinate::Number).unwrap_or_default();

    GeoRecord {
        ip: or_na(Some(ip)),
        city: or_na(city.city.as_ref().and_then(|c| localized(&c.names, lang))),
        region: or_na(
            city.subdivisions
                .first()
                .and_then(|s| localized(&s.names, lang)),
        ),
        country: iso_code.clone(),
        country_name: or_na(city.country.as_ref().and_then(|c| localized(&c.names, lang))),
        country_code: iso_code,
        latitude: coordinate(location.and_then(|l| l.latitude)),
        longitude: coordinate(location.and_then(|l| l.longitude)),
        asn: asn
            .autonomous_system_number
            .filter(|n| *n != 0)
            .map(|n| format!("AS{}", n))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        org: or_na(asn.autonomous_system_organization.as_deref()),
        isp: None,
        postal: None,
        timezone: None,
        note: None,
    }
}

/// 两个已打开的数据库
pub struct Databases {
    city: Reader<Vec<u8>>,
    asn: Reader<Vec<u8>>,
}

impl Databases {
    pub fn open(city_path: &str, asn_path: &str) -> Result<Self> {
        let open = |path: &str| {
            Reader::open_readfile(path).map_err(|e| {
                GeoError::configuration(format!("Failed to open MaxMind database {}: {}", path, e))
            })
        };

        Ok(Self {
            city: open(city_path)?,
            asn: open(asn_path)?,
        })
    }

    fn decode<T>(reader: &Reader<Vec<u8>>, ip: IpAddr) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let result = reader.lookup(ip)?;
        Ok(result.decode::<T>()?.unwrap_or_default())
    }

    /// 独立查询两个库；库中没有该 IP 时得到空记录而不是错误
    pub fn lookup(&self, raw_ip: &str, ip: IpAddr, lang: Language) -> Result<GeoRecord> {
        let city: CityRecord = Self::decode(&self.city, ip)?;
        let asn: AsnRecord = Self::decode(&self.asn, ip)?;

        trace!("MaxMind lookup for {}: city={:?}, asn={:?}", ip, city, asn);

        Ok(normalize_maxmind(raw_ip, lang, &city, &asn))
    }
}

/// 数据库加载状态
pub enum DatabaseState<'a> {
    Uninitialized,
    Ready(&'a Databases),
    Failed(&'a str),
}

impl DatabaseState<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            DatabaseState::Uninitialized => "loading",
            DatabaseState::Ready(_) => "ready",
            DatabaseState::Failed(_) => "failed",
        }
    }
}

/// MaxMind GeoIP Provider
pub struct MaxMindProvider {
    city_path: String,
    asn_path: String,
    loaded: OnceLock<std::result::Result<Databases, String>>,
}

impl MaxMindProvider {
    /// 创建未初始化的 Provider，需再调用 [`initialize`](Self::initialize)
    pub fn new(city_path: impl Into<String>, asn_path: impl Into<String>) -> Self {
        Self {
            city_path: city_path.into(),
            asn_path: asn_path.into(),
            loaded: OnceLock::new(),
        }
    }

    pub fn state(&self) -> DatabaseState<'_> {
        match self.loaded.get() {
            None => DatabaseState::Uninitialized,
            Some(Ok(databases)) => DatabaseState::Ready(databases),
            Some(Err(reason)) => DatabaseState::Failed(reason),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), DatabaseState::Ready(_))
    }

    /// 在 blocking 线程池中打开两个数据库，结果只写入一次
    pub async fn initialize(&self) {
        if self.loaded.get().is_some() {
            warn!("MaxMind databases already initialized, ignoring");
            return;
        }

        let city_path = self.city_path.clone();
        let asn_path = self.asn_path.clone();
        let outcome = tokio::task::spawn_blocking(move || Databases::open(&city_path, &asn_path))
            .await
            .map_err(GeoError::from)
            .and_then(|opened| opened)
            .map_err(|e| e.message().to_string());

        match &outcome {
            Ok(_) => info!(
                "MaxMind databases initialized successfully ({}, {})",
                self.city_path, self.asn_path
            ),
            Err(reason) => {
                error!("Failed to initialize MaxMind databases: {}", reason);
                error!("MaxMind API will return errors until databases are properly configured");
            }
        }

        if self.loaded.set(outcome).is_err() {
            warn!("MaxMind databases were initialized concurrently, keeping the first result");
        }
    }

    fn ready_databases(&self) -> Result<&Databases> {
        match self.state() {
            DatabaseState::Ready(databases) => Ok(databases),
            _ => Err(GeoError::unavailable(MSG_UNAVAILABLE)),
        }
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindProvider {
    async fn lookup(&self, query: &LookupQuery) -> Result<GeoRecord> {
        // 可用性先于参数校验
        let databases = self.ready_databases()?;
        let ip = require_ip(query.ip())?;
        let lang = Language::from_query(query.lang());

        databases.lookup(query.ip().unwrap_or_default(), ip, lang)
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
