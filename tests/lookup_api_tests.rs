//! Lookup API tests
//!
//! Drives the full `/api/*` and `/health` surface through `StartupContext::configure`,
//! with a canned HTTP fetcher standing in for the upstream providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::http::StatusCode;
use actix_web::http::header::REFERER;
use actix_web::test::{self, TestRequest};
use actix_web::App;
use serde_json::{Value, json};

use geoip_bridge::config::StaticConfig;
use geoip_bridge::errors::{GeoError, Result};
use geoip_bridge::runtime::lifetime::StartupContext;
use geoip_bridge::services::geoip::HttpFetcher;

// =============================================================================
// Test Setup
// =============================================================================

const ALLOWED_REFERER: &str = "https://ip.example.com/lookup";

const TRACE_BODY: &str = "fl=29f1\nh=1.1.1.1\nip=9.9.9.9\nts=1700000000.1\nloc=US\ncolo=SJC\n";

const IPGEO_BODY: &str = r#"{
    "ip": "8.8.8.8",
    "city": "Mountain View",
    "state_prov": "California",
    "country_code2": "US",
    "country_name": "United States",
    "latitude": "37.42240",
    "longitude": "-122.08421",
    "isp": "AS15169 Google LLC",
    "organization": "Google LLC",
    "zipcode": "94043-1351",
    "time_zone": { "name": "America/Los_Angeles", "offset": -8 }
}"#;

/// 返回固定内容并记录调用次数的 fetcher
struct CannedFetcher {
    response: Result<String>,
    calls: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl CannedFetcher {
    fn ok(body: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(body.to_string()),
            calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    fn failing(err: GeoError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(err),
            calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

impl HttpFetcher for CannedFetcher {
    fn get_text(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());
        self.response.clone()
    }
}

fn test_config() -> StaticConfig {
    let mut config = StaticConfig::default();
    config.access.allowed_domains = "ip.example.com".to_string();
    config.providers.ipgeolocation_api_key = "test-key".to_string();
    config.providers.ipgeolocation_url = "https://ipgeo.test/ipgeo".to_string();
    config.providers.cloudflare_trace_url = "https://trace.test/cdn-cgi/trace".to_string();
    config.maxmind.city_db_path = "/nonexistent/GeoLite2-City.mmdb".to_string();
    config.maxmind.asn_db_path = "/nonexistent/GeoLite2-ASN.mmdb".to_string();
    config
}

/// 发起一次 GET 请求，返回状态码和 JSON 响应体
async fn get_json(
    config: &StaticConfig,
    fetcher: Arc<CannedFetcher>,
    uri: &str,
    referer: Option<&str>,
) -> (StatusCode, Value) {
    let ctx = StartupContext::with_fetcher(config, fetcher);
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let mut req = TestRequest::get().uri(uri);
    if let Some(referer) = referer {
        req = req.insert_header((REFERER, referer));
    }

    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

fn assert_error(body: &Value, message: &str) {
    assert_eq!(body, &json!({ "error": message }));
}

fn assert_mandatory_fields(body: &Value) {
    for field in [
        "ip",
        "city",
        "region",
        "country",
        "country_name",
        "country_code",
        "latitude",
        "longitude",
        "asn",
        "org",
    ] {
        assert!(body.get(field).is_some(), "missing field {}", field);
    }
}

// =============================================================================
// Referer gatekeeper
// =============================================================================

#[actix_web::test]
async fn test_missing_referer_is_rejected() {
    let fetcher = CannedFetcher::ok(TRACE_BODY);
    let (status, body) = get_json(&test_config(), fetcher.clone(), "/api/cloudflare-ip", None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "What are you doing?");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_foreign_referer_is_rejected() {
    let fetcher = CannedFetcher::ok(IPGEO_BODY);
    let (status, body) = get_json(
        &test_config(),
        fetcher.clone(),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some("https://evil.test/page"),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "Access denied");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_unparsable_referer_is_rejected() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok(TRACE_BODY),
        "/api/cloudflare-ip",
        Some("not a url"),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "Access denied");
}

#[actix_web::test]
async fn test_localhost_referer_is_always_allowed() {
    let mut config = test_config();
    config.access.allowed_domains = String::new();

    let (status, _) = get_json(
        &config,
        CannedFetcher::ok(TRACE_BODY),
        "/api/cloudflare-ip",
        Some("http://localhost:3000/"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_gatekeeper_runs_before_maxmind_availability() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok(""),
        "/api/maxmind?ip=8.8.8.8",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "What are you doing?");
}

// =============================================================================
// Cloudflare trace
// =============================================================================

#[actix_web::test]
async fn test_cloudflare_trace_record() {
    let fetcher = CannedFetcher::ok(TRACE_BODY);
    let (status, body) = get_json(
        &test_config(),
        fetcher.clone(),
        "/api/cloudflare-ip",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ip"], "9.9.9.9");
    assert_eq!(body["country"], "US");
    assert_eq!(body["country_name"], "US");
    assert_eq!(body["country_code"], "US");
    assert_eq!(body["city"], "N/A");
    assert_eq!(body["region"], "N/A");
    assert_eq!(body["latitude"], "N/A");
    assert_eq!(body["longitude"], "N/A");
    assert_eq!(body["asn"], "N/A");
    assert_eq!(body["org"], "Cloudflare SJC");
    assert!(body.get("isp").is_none());
    assert_eq!(
        body["note"],
        "Cloudflare trace provides limited geolocation data"
    );
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(
        fetcher.last_url().as_deref(),
        Some("https://trace.test/cdn-cgi/trace")
    );
}

#[actix_web::test]
async fn test_cloudflare_ignores_valid_ip_parameter() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok(TRACE_BODY),
        "/api/cloudflare-ip?ip=1.1.1.1",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // trace 只描述请求方自己
    assert_eq!(body["ip"], "9.9.9.9");
}

#[actix_web::test]
async fn test_cloudflare_rejects_invalid_ip_without_upstream_call() {
    let fetcher = CannedFetcher::ok(TRACE_BODY);
    let (status, body) = get_json(
        &test_config(),
        fetcher.clone(),
        "/api/cloudflare-ip?ip=999.999.999.999",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "Invalid IP address");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_cloudflare_network_failure() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::failing(GeoError::upstream("connection refused")),
        "/api/cloudflare-ip",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "connection refused");
}

#[actix_web::test]
async fn test_cloudflare_unparsable_body() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok("<html>gateway timeout</html>"),
        "/api/cloudflare-ip",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "Error parsing trace data");
}

#[actix_web::test]
async fn test_cloudflare_sparse_trace_keeps_shape() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok("fl=1\n"),
        "/api/cloudflare-ip",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_mandatory_fields(&body);
    assert_eq!(body["ip"], "N/A");
    assert_eq!(body["org"], "N/A");
}

// =============================================================================
// ipgeolocation.io
// =============================================================================

#[actix_web::test]
async fn test_ipgeolocation_record() {
    let fetcher = CannedFetcher::ok(IPGEO_BODY);
    let (status, body) = get_json(
        &test_config(),
        fetcher.clone(),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ip"], "8.8.8.8");
    assert_eq!(body["city"], "Mountain View");
    assert_eq!(body["region"], "California");
    assert_eq!(body["country"], "US");
    assert_eq!(body["country_code"], "US");
    assert_eq!(body["country_name"], "United States");
    assert_eq!(body["latitude"], "37.42240");
    assert_eq!(body["longitude"], "-122.08421");
    assert_eq!(body["asn"], "AS15169");
    assert_eq!(body["org"], "AS15169 Google LLC");
    assert_eq!(body["postal"], "94043-1351");
    assert_eq!(body["timezone"], "America/Los_Angeles");

    let url = fetcher.last_url().expect("upstream should be called");
    assert!(url.starts_with("https://ipgeo.test/ipgeo?"));
    assert!(url.contains("apiKey=test-key"));
    assert!(url.contains("ip=8.8.8.8"));
}

#[actix_web::test]
async fn test_ipgeolocation_asn_from_organization() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok(r#"{"ip":"203.0.113.9","isp":"Comcast Cable","organization":"ExampleOrg"}"#),
        "/api/ipgeolocation-io?ip=203.0.113.9",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asn"], "ASExampleOrg");
    assert_eq!(body["org"], "Comcast Cable");
}

#[actix_web::test]
async fn test_ipgeolocation_empty_payload_keeps_shape() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok("{}"),
        "/api/ipgeolocation-io?ip=8.8.4.4",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_mandatory_fields(&body);
    assert_eq!(body["asn"], "N/A");
    assert_eq!(body["latitude"], "N/A");
}

#[actix_web::test]
async fn test_ipgeolocation_missing_ip() {
    let fetcher = CannedFetcher::ok(IPGEO_BODY);
    let (status, body) = get_json(
        &test_config(),
        fetcher.clone(),
        "/api/ipgeolocation-io",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "No IP address provided");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_ipgeolocation_invalid_ip() {
    let fetcher = CannedFetcher::ok(IPGEO_BODY);
    let (status, body) = get_json(
        &test_config(),
        fetcher.clone(),
        "/api/ipgeolocation-io?ip=999.999.999.999",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "Invalid IP address");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_ipgeolocation_without_api_key() {
    let mut config = test_config();
    config.providers.ipgeolocation_api_key = String::new();
    let fetcher = CannedFetcher::ok(IPGEO_BODY);

    let (status, body) = get_json(
        &config,
        fetcher.clone(),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "API key not configured");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_ipgeolocation_invalid_ip_reported_before_missing_key() {
    let mut config = test_config();
    config.providers.ipgeolocation_api_key = String::new();
    let fetcher = CannedFetcher::ok(IPGEO_BODY);

    let (status, body) = get_json(
        &config,
        fetcher.clone(),
        "/api/ipgeolocation-io?ip=999.999.999.999",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "Invalid IP address");
    assert_eq!(fetcher.calls(), 0);
}

#[actix_web::test]
async fn test_ipgeolocation_blank_key_list() {
    let mut config = test_config();
    config.providers.ipgeolocation_api_key = " , ,".to_string();

    let (status, body) = get_json(
        &config,
        CannedFetcher::ok(IPGEO_BODY),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "No valid API key found");
}

#[actix_web::test]
async fn test_ipgeolocation_key_is_chosen_from_pool() {
    let mut config = test_config();
    config.providers.ipgeolocation_api_key = "key-a, key-b".to_string();
    let fetcher = CannedFetcher::ok(IPGEO_BODY);

    let (status, _) = get_json(
        &config,
        fetcher.clone(),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let url = fetcher.last_url().expect("upstream should be called");
    assert!(url.contains("apiKey=key-a") || url.contains("apiKey=key-b"));
}

#[actix_web::test]
async fn test_ipgeolocation_bad_json() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::ok("not json at all"),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "Error parsing JSON");
}

#[actix_web::test]
async fn test_ipgeolocation_upstream_status_error() {
    let (status, body) = get_json(
        &test_config(),
        CannedFetcher::failing(GeoError::upstream("HTTP error! status: 401")),
        "/api/ipgeolocation-io?ip=8.8.8.8",
        Some(ALLOWED_REFERER),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "HTTP error! status: 401");
}

// =============================================================================
// MaxMind
// =============================================================================

#[actix_web::test]
async fn test_maxmind_unavailable_before_load() {
    for uri in [
        "/api/maxmind?ip=8.8.8.8",
        "/api/maxmind?ip=999.999.999.999",
        "/api/maxmind",
    ] {
        let (status, body) =
            get_json(&test_config(), CannedFetcher::ok(""), uri, Some(ALLOWED_REFERER)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "uri {}", uri);
        assert_error(&body, "MaxMind database not available");
    }
}

#[actix_web::test]
async fn test_maxmind_unavailable_after_failed_load() {
    let config = test_config();
    let ctx = StartupContext::with_fetcher(&config, CannedFetcher::ok(""));
    ctx.maxmind.initialize().await;
    assert!(!ctx.maxmind.is_ready());

    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;
    let req = TestRequest::get()
        .uri("/api/maxmind?ip=8.8.8.8&lang=fr")
        .insert_header((REFERER, ALLOWED_REFERER))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_error(&body, "MaxMind database not available");
}

/// 加载 `tests/fixtures/maxmind/<set>` 下的数据库后返回上下文
async fn loaded_maxmind_context(set: &str) -> StartupContext {
    let dir = format!("{}/tests/fixtures/maxmind/{}", env!("CARGO_MANIFEST_DIR"), set);
    let mut config = test_config();
    config.maxmind.city_db_path = format!("{}/GeoLite2-City.mmdb", dir);
    config.maxmind.asn_db_path = format!("{}/GeoLite2-ASN.mmdb", dir);

    let ctx = StartupContext::with_fetcher(&config, CannedFetcher::ok(""));
    ctx.maxmind.initialize().await;
    assert!(ctx.maxmind.is_ready(), "fixture databases should load");
    ctx
}

async fn get_loaded_json(ctx: &StartupContext, uri: &str) -> (StatusCode, Value) {
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;
    let req = TestRequest::get()
        .uri(uri)
        .insert_header((REFERER, ALLOWED_REFERER))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

#[actix_web::test]
async fn test_maxmind_record_after_load() {
    let ctx = loaded_maxmind_context("beijing").await;
    let (status, body) = get_loaded_json(&ctx, "/api/maxmind?ip=202.106.0.20").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "ip": "202.106.0.20",
            "city": "Beijing",
            "region": "Beijing",
            "country": "CN",
            "country_name": "China",
            "country_code": "CN",
            "latitude": 39.9143,
            "longitude": 116.3861,
            "asn": "AS4808",
            "org": "China Unicom Beijing Province Network"
        })
    );
}

#[actix_web::test]
async fn test_maxmind_language_with_english_fallback() {
    let ctx = loaded_maxmind_context("beijing").await;

    let (status, body) = get_loaded_json(&ctx, "/api/maxmind?ip=202.106.0.20&lang=zh-CN").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "北京");
    assert_eq!(body["region"], "Beijing");
    assert_eq!(body["country_name"], "中国");

    let (_, body) = get_loaded_json(&ctx, "/api/maxmind?ip=202.106.0.20&lang=fr").await;
    assert_eq!(body["city"], "Beijing");
    assert_eq!(body["region"], "Pékin");
    assert_eq!(body["country_name"], "Chine");

    let (_, body) = get_loaded_json(&ctx, "/api/maxmind?ip=202.106.0.20&lang=de").await;
    assert_eq!(body["city"], "Beijing");
    assert_eq!(body["country_name"], "China");
}

#[actix_web::test]
async fn test_maxmind_unknown_address_is_all_na() {
    let ctx = loaded_maxmind_context("empty").await;

    for ip in ["8.8.8.8", "2001:db8::1"] {
        let (status, body) = get_loaded_json(&ctx, &format!("/api/maxmind?ip={}", ip)).await;

        assert_eq!(status, StatusCode::OK, "ip {}", ip);
        assert_mandatory_fields(&body);
        assert_eq!(body["ip"], ip);
        for field in ["city", "region", "country", "country_name", "asn", "org", "latitude"] {
            assert_eq!(body[field], "N/A", "field {} for {}", field, ip);
        }
    }
}

#[actix_web::test]
async fn test_maxmind_rejects_bad_ip_once_loaded() {
    let ctx = loaded_maxmind_context("empty").await;

    let (status, body) = get_loaded_json(&ctx, "/api/maxmind?ip=999.999.999.999").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "Invalid IP address");

    let (status, body) = get_loaded_json(&ctx, "/api/maxmind").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "No IP address provided");
}

#[actix_web::test]
async fn test_health_reports_ready_after_load() {
    let ctx = loaded_maxmind_context("empty").await;
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;
    let resp = test::call_service(&app, TestRequest::get().uri("/health").to_request()).await;

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["maxmind"], "ready");
}

// =============================================================================
// Health
// =============================================================================

#[actix_web::test]
async fn test_health_reports_maxmind_state() {
    let (status, body) = get_json(&test_config(), CannedFetcher::ok(""), "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["maxmind"], "loading");
    assert!(body["uptime"].is_u64());
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn test_health_after_failed_load() {
    let config = test_config();
    let ctx = StartupContext::with_fetcher(&config, CannedFetcher::ok(""));
    ctx.maxmind.initialize().await;

    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;
    let resp = test::call_service(&app, TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["maxmind"], "failed");
}
