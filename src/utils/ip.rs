//! IP 地址处理工具
//!
//! 只做语法校验：不做 DNS 解析，也不检查可达性

use std::net::IpAddr;

use crate::errors::{GeoError, Result};

pub const MSG_NO_IP: &str = "No IP address provided";
pub const MSG_INVALID_IP: &str = "Invalid IP address";

/// 检查字符串是否为合法的 IPv4 / IPv6 地址
pub fn is_valid_ip(candidate: &str) -> bool {
    candidate.parse::<IpAddr>().is_ok()
}

/// 必填的 `ip` 参数：缺失或为空 → 400，格式非法 → 400
pub fn require_ip(candidate: Option<&str>) -> Result<IpAddr> {
    let Some(raw) = candidate.filter(|s| !s.is_empty()) else {
        return Err(GeoError::invalid_input(MSG_NO_IP));
    };

    raw.parse::<IpAddr>()
        .map_err(|_| GeoError::invalid_input(MSG_INVALID_IP))
}

/// 可选的 `ip` 参数：为空时放行，非空时必须合法
pub fn validate_optional_ip(candidate: Option<&str>) -> Result<()> {
    match candidate {
        Some(raw) if !raw.is_empty() && !is_valid_ip(raw) => {
            Err(GeoError::invalid_input(MSG_INVALID_IP))
        }
        _ => Ok(()),
    }
}
