//! GeoIP 服务模块
//!
//! 三个数据源，统一输出 [`GeoRecord`]：
//! - Cloudflare trace（只能查询请求方自己）
//! - ipgeolocation.io（需要 API Key）
//! - MaxMind GeoLite2 本地数据库

pub mod cloudflare;
pub mod http;
pub mod ipgeolocation;
pub mod maxmind;
mod provider;
pub mod record;

pub use cloudflare::CloudflareTrace;
pub use http::{HttpFetcher, UreqFetcher};
pub use ipgeolocation::{ApiKeyPool, IpGeolocationIo};
pub use maxmind::{DatabaseState, Language, MaxMindProvider};
pub use provider::{GeoIpLookup, LookupQuery};
pub use record::{Coordinate, GeoRecord, NOT_AVAILABLE};
