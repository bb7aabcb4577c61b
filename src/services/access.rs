//! Referer 白名单
//!
//! 唯一的访问控制手段：Referer 的 hostname 必须在白名单中。
//! 没有 Referer 或无法解析时一律拒绝。

use tracing::{debug, warn};
use url::Url;

use crate::errors::{GeoError, Result};

/// 固定放行的主机名
pub const DEFAULT_ALLOWED_HOST: &str = "localhost";

pub const MSG_NO_REFERER: &str = "What are you doing?";
pub const MSG_ACCESS_DENIED: &str = "Access denied";

#[derive(Debug, Clone)]
pub struct AllowList {
    hosts: Vec<String>,
}

impl AllowList {
    /// `localhost` + 配置的域名（去空白，忽略空项）
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hosts = vec![DEFAULT_ALLOWED_HOST.to_string()];
        hosts.extend(
            domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_string())
                .filter(|d| !d.is_empty()),
        );
        Self { hosts }
    }

    /// 逗号分隔形式（`ALLOWED_DOMAINS=a.com,b.com`）
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Referer 的 hostname 是否在白名单中
    pub fn permits(&self, referer: Option<&str>) -> bool {
        let Some(referer) = referer else {
            return false;
        };

        match Url::parse(referer) {
            Ok(url) => url
                .host_str()
                .is_some_and(|host| self.hosts.iter().any(|h| h == host)),
            Err(e) => {
                debug!("Invalid referer URL '{}': {}", referer, e);
                false
            }
        }
    }

    /// 与 `permits` 相同，但区分“没有 Referer”和“不在白名单”两种提示
    pub fn check(&self, referer: Option<&str>) -> Result<()> {
        if self.permits(referer) {
            return Ok(());
        }

        match referer {
            None => {
                debug!("Request rejected: missing referer");
                Err(GeoError::access_denied(MSG_NO_REFERER))
            }
            Some(r) => {
                warn!("Request rejected: referer '{}' not allowed", r);
                Err(GeoError::access_denied(MSG_ACCESS_DENIED))
            }
        }
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}
