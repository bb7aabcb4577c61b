//! 统一输出结构
//!
//! 三个数据源最终都转换成 [`GeoRecord`]。
//! 必填字段永远存在，取不到值时为字面量 `"N/A"`；
//! 可选字段（postal / timezone / isp / note）只有数据源提供时才会出现在 JSON 中。

use serde::{Deserialize, Serialize};

/// 缺失值占位
pub const NOT_AVAILABLE: &str = "N/A";

/// 经纬度：上游可能给数字，也可能给字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    pub fn not_available() -> Self {
        Coordinate::Text(NOT_AVAILABLE.to_string())
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Coordinate::Text(s) if s == NOT_AVAILABLE)
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::not_available()
    }
}

/// Normalized Geolocation Record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub country_name: String,
    pub country_code: String,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub asn: String,
    pub org: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Default for GeoRecord {
    /// 全部必填字段为 `"N/A"`，可选字段缺省
    fn default() -> Self {
        Self {
            ip: NOT_AVAILABLE.to_string(),
            city: NOT_AVAILABLE.to_string(),
            region: NOT_AVAILABLE.to_string(),
            country: NOT_AVAILABLE.to_string(),
            country_name: NOT_AVAILABLE.to_string(),
            country_code: NOT_AVAILABLE.to_string(),
            latitude: Coordinate::not_available(),
            longitude: Coordinate::not_available(),
            asn: NOT_AVAILABLE.to_string(),
            org: NOT_AVAILABLE.to_string(),
            isp: None,
            postal: None,
            timezone: None,
            note: None,
        }
    }
}

/// 空字符串和 `None` 一样视为缺失
pub fn or_na<S: AsRef<str>>(value: Option<S>) -> String {
    value
        .as_ref()
        .map(|v| v.as_ref())
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// 字符串形式的经纬度为空时同样回落到 `"N/A"`
pub fn coordinate_or_na(value: Option<Coordinate>) -> Coordinate {
    match value {
        Some(Coordinate::Text(s)) if s.is_empty() => Coordinate::not_available(),
        Some(c) => c,
        None => Coordinate::not_available(),
    }
}
