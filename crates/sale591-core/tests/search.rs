use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sale591_core::client::SEARCH_PATH;
use sale591_core::{
    ClientConfig, DelayPolicy, NoDelay, OffsetMode, SaleError, SearchClient, SearchFilter,
    SortSpec,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN: &str = "kP0qL2Zx81";

fn landing_html(token: Option<&str>) -> String {
    let meta = token
        .map(|t| format!(r#"<meta name="csrf-token" content="{}">"#, t))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8">{}<title>591</title></head><body></body></html>"#,
        meta
    )
}

fn page_body(total: u64, count: usize, first_id: usize) -> Value {
    let houses: Vec<Value> = (first_id..first_id + count)
        .map(|id| json!({ "houseid": id, "title": format!("listing {}", id) }))
        .collect();
    json!({ "status": 1, "data": { "total": total, "house_list": houses } })
}

fn ok_page(total: u64, count: usize, first_id: usize) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(page_body(total, count, first_id))
}

async fn site_with_token(token: Option<&str>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(landing_html(token))
                .insert_header("set-cookie", "PHPSESSID=s1; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn mount_page(server: &MockServer, first_row: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("firstRow", first_row))
        .and(header("x-csrf-token", TOKEN))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer, mode: OffsetMode) -> SearchClient {
    let config = ClientConfig {
        base_url: server.uri(),
        cookie_domain: None,
        offset_mode: mode,
        ..ClientConfig::default()
    };
    SearchClient::with_config(config)
        .expect("valid config")
        .with_delay(NoDelay)
}

async fn search_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .into_iter()
        .filter(|r| r.url.path() == SEARCH_PATH)
        .collect()
}

fn cookie_header(request: &Request) -> String {
    request
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[derive(Clone, Default)]
struct CountingDelay {
    calls: Arc<AtomicUsize>,
}

impl DelayPolicy for CountingDelay {
    fn next_delay(&self) -> Duration {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    }
}

#[tokio::test]
async fn test_two_pages_aggregate() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(100, 30, 0), 1).await;
    mount_page(&server, "30", ok_page(100, 30, 30), 1).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let result = client.search(None, None, 2).await.unwrap();

    assert_eq!(result.total_count, 100);
    assert_eq!(result.listings.len(), 60);
    assert_eq!(result.pages_fetched, 2);
    assert!(!result.is_partial());

    // page order, no gaps
    let ids: Vec<u64> = result
        .listings
        .iter()
        .map(|l| l["houseid"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, (0..60).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_offsets_follow_page_size() {
    let server = site_with_token(Some(TOKEN)).await;
    for offset in ["0", "30", "60", "90"] {
        mount_page(&server, offset, ok_page(400, 30, 0), 1).await;
    }

    let client = client_for(&server, OffsetMode::Fresh);
    client.search(None, None, 4).await.unwrap();

    let requests = search_requests(&server).await;
    assert_eq!(requests.len(), 4);
    for (page, request) in requests.iter().enumerate() {
        let offsets: Vec<String> = request
            .url
            .query_pairs()
            .filter(|(k, _)| k == "firstRow")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(offsets, vec![(page * 30).to_string()]);
    }
}

#[tokio::test]
async fn test_failed_page_returns_partial_result() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(50, 30, 0), 1).await;
    mount_page(&server, "30", ResponseTemplate::new(500), 1).await;
    mount_page(&server, "60", ok_page(50, 30, 60), 0).await;

    let delay = CountingDelay::default();
    let client = client_for(&server, OffsetMode::Fresh).with_delay(delay.clone());
    let result = client.search(None, None, 3).await.unwrap();

    assert_eq!(result.total_count, 50);
    assert_eq!(result.listings.len(), 30);
    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.halted_on, Some(500));
    assert_eq!(search_requests(&server).await.len(), 2);
    // one wait, between page 0 and page 1
    assert_eq!(delay.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_first_page_failure_yields_empty_result() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ResponseTemplate::new(403), 1).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let result = client.search(None, None, 2).await.unwrap();

    assert_eq!(result.total_count, 0);
    assert!(result.listings.is_empty());
    assert_eq!(result.halted_on, Some(403));
}

#[tokio::test]
async fn test_total_comes_from_last_page() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(100, 30, 0), 1).await;
    mount_page(&server, "30", ok_page(97, 30, 30), 1).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let (total, listings) = client.search(None, None, 2).await.unwrap().into_parts();

    assert_eq!(total, 97);
    assert_eq!(listings.len(), 60);
}

#[tokio::test]
async fn test_missing_token_stops_before_search() {
    let server = site_with_token(None).await;
    mount_page(&server, "0", ok_page(1, 1, 0), 0).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let result = client.search(None, None, 1).await;

    match result {
        Err(SaleError::MissingToken(url)) => assert!(url.starts_with(&server.uri())),
        other => panic!(
            "Expected MissingToken error, got {:?}",
            other.map(|r| r.total_count)
        ),
    }
    assert!(search_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_region_cookie_from_filter() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(1, 1, 0), 1).await;

    let filter = SearchFilter::new().with("region", "5").with("section", 40);
    let client = client_for(&server, OffsetMode::Fresh);
    client.search(Some(&filter), None, 1).await.unwrap();

    let requests = search_requests(&server).await;
    let cookies = cookie_header(&requests[0]);
    assert!(cookies.contains("urlJumpIp=5"), "cookies: {}", cookies);
    // session cookie from the landing page is carried over
    assert!(cookies.contains("PHPSESSID=s1"), "cookies: {}", cookies);
}

#[tokio::test]
async fn test_region_cookie_defaults_to_one() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(1, 1, 0), 1).await;

    let client = client_for(&server, OffsetMode::Fresh);
    client.search(None, None, 1).await.unwrap();

    let requests = search_requests(&server).await;
    assert!(cookie_header(&requests[0]).contains("urlJumpIp=1"));
}

#[tokio::test]
async fn test_query_keeps_filter_then_sort_order() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(1, 1, 0), 1).await;

    let filter = SearchFilter::new()
        .with("regionid", 3)
        .with("section", 40)
        .with("price", "1_1500");
    let sort = SortSpec::new().with("order", "posttime").with("orderType", "desc");

    let client = client_for(&server, OffsetMode::Fresh);
    client.search(Some(&filter), Some(&sort), 1).await.unwrap();

    let requests = search_requests(&server).await;
    assert_eq!(
        requests[0].url.query(),
        Some(concat!(
            "type=2&category=1&shType=list",
            "&regionid=3&section=40&price=1_1500",
            "&order=posttime&orderType=desc",
            "&firstRow=0"
        ))
    );
}

#[tokio::test]
async fn test_request_headers_carry_token_and_user_agent() {
    let server = site_with_token(Some(TOKEN)).await;
    mount_page(&server, "0", ok_page(1, 1, 0), 1).await;

    let client = client_for(&server, OffsetMode::Fresh);
    client.search(None, None, 1).await.unwrap();

    let requests = search_requests(&server).await;
    let user_agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(user_agent.contains("Safari"));
    assert_eq!(requests[0].headers.get("x-csrf-token").unwrap(), TOKEN);
}

#[tokio::test]
async fn test_accumulated_offsets_for_request_parity() {
    let server = site_with_token(Some(TOKEN)).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ok_page(90, 30, 0))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, OffsetMode::Accumulate);
    let result = client.search(None, None, 3).await.unwrap();
    assert_eq!(result.listings.len(), 90);

    let queries: Vec<String> = search_requests(&server)
        .await
        .iter()
        .map(|r| r.url.query().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        queries,
        vec![
            "type=2&category=1&shType=list&firstRow=0".to_string(),
            "type=2&category=1&shType=list&firstRow=0&firstRow=30".to_string(),
            "type=2&category=1&shType=list&firstRow=0&firstRow=30&firstRow=60".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_no_wait_after_last_page() {
    let server = site_with_token(Some(TOKEN)).await;
    for offset in ["0", "30", "60"] {
        mount_page(&server, offset, ok_page(90, 30, 0), 1).await;
    }

    let delay = CountingDelay::default();
    let client = client_for(&server, OffsetMode::Fresh).with_delay(delay.clone());
    client.search(None, None, 3).await.unwrap();

    assert_eq!(delay.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_pages_fetches_token_only() {
    let server = site_with_token(Some(TOKEN)).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let result = client.search(None, None, 0).await.unwrap();

    assert_eq!(result.total_count, 0);
    assert!(result.listings.is_empty());
    assert!(search_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_malformed_page_is_parse_error() {
    let server = site_with_token(Some(TOKEN)).await;
    let maintenance = ResponseTemplate::new(200).set_body_string("<html>maintenance</html>");
    mount_page(&server, "0", maintenance, 1).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let result = client.search(None, None, 1).await;
    assert!(matches!(result, Err(SaleError::ParseError(_))));
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let config = ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        cookie_domain: None,
        timeout_secs: 5,
        ..ClientConfig::default()
    };
    let client = SearchClient::with_config(config).unwrap().with_delay(NoDelay);
    let result = client.search(None, None, 1).await;
    assert!(matches!(result, Err(SaleError::HttpError(_))));
}

#[tokio::test]
async fn test_each_search_starts_a_new_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing_html(Some(TOKEN))))
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "0", ok_page(1, 1, 0), 2).await;

    let client = client_for(&server, OffsetMode::Fresh);
    let first = SearchFilter::new().with("region", "3");
    client.search(Some(&first), None, 1).await.unwrap();
    client.search(None, None, 1).await.unwrap();

    let requests = search_requests(&server).await;
    assert!(cookie_header(&requests[0]).contains("urlJumpIp=3"));
    let second = cookie_header(&requests[1]);
    assert!(second.contains("urlJumpIp=1"));
    assert!(!second.contains("urlJumpIp=3"));
}

#[tokio::test]
async fn test_cookie_domain_must_cover_base_host() {
    let server = MockServer::start().await;

    // default cookie domain is .591.com.tw, which 127.0.0.1 can never receive
    let config = ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    };
    match SearchClient::with_config(config) {
        Err(SaleError::ConfigError(msg)) => assert!(msg.contains("cookie_domain")),
        Err(other) => panic!("Expected ConfigError, got {}", other),
        Ok(_) => panic!("Expected ConfigError"),
    }

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}
