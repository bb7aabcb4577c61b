pub mod access;
pub mod geoip;

pub use access::AllowList;
pub use geoip::{
    ApiKeyPool, CloudflareTrace, GeoIpLookup, GeoRecord, IpGeolocationIo, LookupQuery,
    MaxMindProvider,
};
