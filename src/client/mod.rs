//! Direct-call client
//!
//! Talks to Cloudflare trace and ipgeolocation.io straight from the caller,
//! without going through the HTTP endpoints or the referer check. Uses the
//! same normalization as the server adapters. MaxMind is not offered here
//! because it needs the local database files.
//!
//! ```text
//! SourceId 0 → ipgeolocation.io (caller supplies the API key)
//! SourceId 1 → Cloudflare trace  (ip is ignored)
//! ```

use std::fmt;
use std::sync::Arc;

use serde_repr::{Deserialize_repr, Serialize_repr};
use tracing::error;

use crate::errors::{GeoError, Result};
use crate::services::geoip::cloudflare::{CloudflareTrace, DEFAULT_TRACE_URL};
use crate::services::geoip::ipgeolocation::{DEFAULT_IPGEO_URL, fetch_ipgeolocation};
use crate::services::geoip::{GeoRecord, HttpFetcher, UreqFetcher};
use crate::utils::require_ip;

/// Numeric data source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SourceId {
    IpGeolocationIo = 0,
    Cloudflare = 1,
}

impl TryFrom<u8> for SourceId {
    type Error = GeoError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SourceId::IpGeolocationIo),
            1 => Ok(SourceId::Cloudflare),
            other => Err(GeoError::invalid_input(format!(
                "Unknown source ID: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::IpGeolocationIo => write!(f, "IPGeolocation.io"),
            SourceId::Cloudflare => write!(f, "Cloudflare"),
        }
    }
}

pub struct DirectClient {
    fetcher: Arc<dyn HttpFetcher>,
    ipgeo_url: String,
    cloudflare: CloudflareTrace,
}

impl DirectClient {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self::with_endpoints(fetcher, DEFAULT_IPGEO_URL, DEFAULT_TRACE_URL)
    }

    pub fn with_endpoints(
        fetcher: Arc<dyn HttpFetcher>,
        ipgeo_url: impl Into<String>,
        trace_url: impl Into<String>,
    ) -> Self {
        Self {
            cloudflare: CloudflareTrace::new(trace_url, fetcher.clone()),
            fetcher,
            ipgeo_url: ipgeo_url.into(),
        }
    }

    /// ipgeolocation.io with a caller-supplied key (no key pool here)
    pub async fn fetch_ipgeolocation(&self, ip: &str, api_key: &str) -> Result<GeoRecord> {
        if api_key.is_empty() {
            return Err(GeoError::configuration(
                "API key is required for IPGeolocation.io",
            ));
        }
        let ip = require_ip(Some(ip))?;

        fetch_ipgeolocation(
            self.fetcher.clone(),
            &self.ipgeo_url,
            api_key,
            &ip.to_string(),
        )
        .await
    }

    /// Cloudflare trace always describes the caller
    ///
    /// Unlike the `/api/cloudflare-ip` endpoint, the client also fills `isp`
    /// with the colo label.
    pub async fn fetch_cloudflare(&self) -> Result<GeoRecord> {
        let record = self.cloudflare.fetch().await?;
        Ok(GeoRecord {
            isp: Some(record.org.clone()),
            ..record
        })
    }

    /// Dispatch by numeric source id
    pub async fn fetch_ip_data(
        &self,
        source_id: u8,
        ip: &str,
        api_key: &str,
    ) -> Result<GeoRecord> {
        let source = SourceId::try_from(source_id)?;
        let result = match source {
            SourceId::IpGeolocationIo => self.fetch_ipgeolocation(ip, api_key).await,
            SourceId::Cloudflare => self.fetch_cloudflare().await,
        };

        if let Err(ref e) = result {
            error!("{} API error: {}", source, e);
        }
        result
    }
}

impl Default for DirectClient {
    fn default() -> Self {
        Self::new(Arc::new(UreqFetcher::default()))
    }
}
