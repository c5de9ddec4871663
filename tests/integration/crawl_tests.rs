//! Integration tests for the crawl pipeline
//!
//! These tests use wiremock to create mock HTTP servers and run the
//! coordinator, dispatcher and worker end-to-end against a real SQLite
//! store and an in-memory body store and bus.

use flate2::write::GzEncoder;
use flate2::Compression;
use marksync::body_store::{BodyStore, MemoryBodyStore};
use marksync::bookmark::{Bookmark, TagTriples};
use marksync::config::UserAgentConfig;
use marksync::crawler::{build_http_client, shared, CrawlCoordinator, CrawlDispatcher, CrawlWorker};
use marksync::messaging::{MemoryBus, MessageBus};
use marksync::storage::{BookmarkStore, CrawlRecordStore, SqliteStorage};
use marksync::url::CanonicalUrl;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "response-bodies";

struct Harness {
    coordinator: CrawlCoordinator<SqliteStorage>,
    bodies: Arc<MemoryBodyStore>,
}

/// Builds a coordinator over an in-memory store with the given fetch timeout
fn create_harness(timeout: Duration) -> Harness {
    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    let client = build_http_client(&user_agent, timeout).expect("Failed to build client");
    let storage = shared(SqliteStorage::new_in_memory().expect("Failed to open storage"));
    let bodies = Arc::new(MemoryBodyStore::new());
    let body_store: Arc<dyn BodyStore> = bodies.clone();

    Harness {
        coordinator: CrawlCoordinator::new(storage, body_store, client, BUCKET),
        bodies,
    }
}

fn url_on(server: &MockServer, page: &str) -> CanonicalUrl {
    CanonicalUrl::parse(&format!("{}{}", server.uri(), page)).expect("Mock URL is canonical")
}

fn bookmark_for(url: CanonicalUrl) -> Bookmark {
    let now = chrono::Utc::now();
    Bookmark {
        url,
        title: "A page".to_string(),
        description: String::new(),
        created: now,
        updated: now,
        unread: true,
        deleted: false,
        tag_triples: TagTriples::new(),
    }
}

#[tokio::test]
async fn test_crawl_success_records_response_and_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"hello".to_vec(), "text/plain"))
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_secs(5));
    let url = url_on(&mock_server, "/hello");

    let crawl_uuid = harness.coordinator.crawl_url(&url).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    let request = storage.get_crawl_request(crawl_uuid).unwrap().unwrap();
    assert!(request.got_response);
    assert_eq!(request.url_uuid, url.url_uuid);

    let response = storage.get_crawl_response(crawl_uuid).unwrap().unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.headers.get("content-type").map(String::as_str),
        Some("text/plain")
    );
    assert!(response
        .headers
        .keys()
        .all(|name| name.chars().all(|c| !c.is_ascii_uppercase())));

    let key = response.body_uuid.to_string();
    assert_eq!(harness.bodies.keys(BUCKET), vec![key.clone()]);
    assert_eq!(harness.bodies.download(BUCKET, &key).unwrap(), b"hello");

    // Stored form is gzip
    let raw = harness.bodies.download_raw(BUCKET, &key).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    assert!(storage.is_crawled(&url).unwrap());
}

#[tokio::test]
async fn test_oversized_body_is_not_recorded() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'a'; 4096], "text/plain"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/small"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'a'; 512], "text/plain"))
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_secs(5));
    let coordinator = harness.coordinator.clone().with_max_body_bytes(1024);
    let huge = url_on(&mock_server, "/huge");
    let small = url_on(&mock_server, "/small");

    let huge_crawl = coordinator.crawl_url(&huge).await.unwrap();
    let small_crawl = coordinator.crawl_url(&small).await.unwrap();

    let storage = coordinator.storage().lock().unwrap();
    assert!(!storage.get_crawl_request(huge_crawl).unwrap().unwrap().got_response);
    assert!(storage.get_crawl_response(huge_crawl).unwrap().is_none());
    assert!(!storage.is_crawled(&huge).unwrap());

    let response = storage.get_crawl_response(small_crawl).unwrap().unwrap();
    assert_eq!(harness.bodies.keys(BUCKET), vec![response.body_uuid.to_string()]);
}

#[tokio::test]
async fn test_error_statuses_are_still_responses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_secs(5));
    let missing = url_on(&mock_server, "/missing");
    let broken = url_on(&mock_server, "/broken");

    let missing_crawl = harness.coordinator.crawl_url(&missing).await.unwrap();
    let broken_crawl = harness.coordinator.crawl_url(&broken).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    let response = storage.get_crawl_response(missing_crawl).unwrap().unwrap();
    assert_eq!(response.status_code, 404);
    assert_eq!(
        harness
            .bodies
            .download(BUCKET, &response.body_uuid.to_string())
            .unwrap(),
        b"not here"
    );

    let response = storage.get_crawl_response(broken_crawl).unwrap().unwrap();
    assert_eq!(response.status_code, 500);
    assert!(harness
        .bodies
        .download(BUCKET, &response.body_uuid.to_string())
        .unwrap()
        .is_empty());

    assert!(storage.is_crawled(&missing).unwrap());
    assert!(storage.is_crawled(&broken).unwrap());
}

#[tokio::test]
async fn test_content_encoding_is_undone_before_storing() {
    let mock_server = MockServer::start().await;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"<html>hello</html>").unwrap();
    let gzipped = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(path("/gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(gzipped, "text/html")
                .insert_header("content-encoding", "gzip"),
        )
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_secs(5));
    let url = url_on(&mock_server, "/gz");

    let crawl_uuid = harness.coordinator.crawl_url(&url).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    let response = storage.get_crawl_response(crawl_uuid).unwrap().unwrap();
    assert!(!response.headers.contains_key("content-encoding"));
    assert_eq!(
        harness
            .bodies
            .download(BUCKET, &response.body_uuid.to_string())
            .unwrap(),
        b"<html>hello</html>"
    );
}

#[tokio::test]
async fn test_timeout_leaves_request_without_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_millis(500));
    let url = url_on(&mock_server, "/slow");

    let crawl_uuid = harness.coordinator.crawl_url(&url).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    let request = storage.get_crawl_request(crawl_uuid).unwrap().unwrap();
    assert!(!request.got_response);
    assert!(storage.get_crawl_response(crawl_uuid).unwrap().is_none());
    assert!(!storage.is_crawled(&url).unwrap());
    assert!(harness.bodies.is_empty());
}

#[tokio::test]
async fn test_connection_refused_leaves_request_without_response() {
    let harness = create_harness(Duration::from_secs(5));
    let url = CanonicalUrl::parse("http://127.0.0.1:1/").unwrap();

    let crawl_uuid = harness.coordinator.crawl_url(&url).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    assert!(!storage.get_crawl_request(crawl_uuid).unwrap().unwrap().got_response);
    assert!(storage.get_crawl_response(crawl_uuid).unwrap().is_none());
}

#[tokio::test]
async fn test_ensure_url_is_crawled_fetches_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"hello".to_vec(), "text/plain"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_secs(5));
    let url = url_on(&mock_server, "/once");

    harness.coordinator.ensure_url_is_crawled(&url).await.unwrap();
    harness.coordinator.ensure_url_is_crawled(&url).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    assert_eq!(storage.count_crawl_responses(&url).unwrap(), 1);
    assert_eq!(storage.crawl_counts().unwrap().requests, 1);
}

#[tokio::test]
async fn test_failed_crawl_is_retried_by_next_ensure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_secs(5)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_millis(500));
    let url = url_on(&mock_server, "/flaky");

    harness.coordinator.ensure_url_is_crawled(&url).await.unwrap();
    harness.coordinator.ensure_url_is_crawled(&url).await.unwrap();

    let storage = harness.coordinator.storage().lock().unwrap();
    let counts = storage.crawl_counts().unwrap();
    assert_eq!(counts.requests, 2);
    assert_eq!(counts.requests_without_response, 1);
    assert_eq!(storage.count_crawl_responses(&url).unwrap(), 1);
}

#[tokio::test]
async fn test_dispatch_then_work_crawls_every_bookmark_once() {
    let mock_server = MockServer::start().await;
    let pages = ["/a", "/b", "/c"];
    for page in pages {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("page {}", page)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let harness = create_harness(Duration::from_secs(5));
    let urls: Vec<CanonicalUrl> = pages.iter().map(|p| url_on(&mock_server, p)).collect();
    {
        let mut storage = harness.coordinator.storage().lock().unwrap();
        for url in &urls {
            storage.set_bookmark(&bookmark_for(url.clone())).unwrap();
        }
    }

    let bus = Arc::new(MemoryBus::default());
    let dispatcher = CrawlDispatcher::new(
        Arc::clone(harness.coordinator.storage()),
        bus.clone(),
        "crawls",
    );

    assert_eq!(dispatcher.request_crawls_for_uncrawled_urls().unwrap(), 3);
    assert_eq!(bus.published("crawls").len(), 3);

    let worker = CrawlWorker::new(harness.coordinator.clone(), bus.clone(), 2);
    let summary = worker.run_until_idle("crawls").await.unwrap();

    assert_eq!(summary.received, 3);
    assert_eq!(summary.acked, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(bus.pending("crawls").unwrap(), 0);

    {
        let storage = harness.coordinator.storage().lock().unwrap();
        for url in &urls {
            assert_eq!(storage.count_crawl_responses(url).unwrap(), 1);
        }
        assert!(storage.get_uncrawled_urls().unwrap().is_empty());
    }
    assert_eq!(harness.bodies.len(), 3);

    // A second pass finds nothing left to do
    assert_eq!(dispatcher.request_crawls_for_uncrawled_urls().unwrap(), 0);
}

#[tokio::test]
async fn test_redelivered_message_does_not_refetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dup"))
        .respond_with(ResponseTemplate::new(200).set_body_string("once"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = create_harness(Duration::from_secs(5));
    let url = url_on(&mock_server, "/dup");
    harness
        .coordinator
        .storage()
        .lock()
        .unwrap()
        .set_bookmark(&bookmark_for(url.clone()))
        .unwrap();

    let bus = Arc::new(MemoryBus::default());
    let dispatcher = CrawlDispatcher::new(
        Arc::clone(harness.coordinator.storage()),
        bus.clone(),
        "crawls",
    );
    // Two passes before any worker runs: the same URL is published twice
    dispatcher.request_crawls_for_uncrawled_urls().unwrap();
    dispatcher.request_crawls_for_uncrawled_urls().unwrap();

    let worker = CrawlWorker::new(harness.coordinator.clone(), bus.clone(), 1);
    let summary = worker.run_until_idle("crawls").await.unwrap();

    assert_eq!(summary.acked, 2);
    let storage = harness.coordinator.storage().lock().unwrap();
    assert_eq!(storage.count_crawl_responses(&url).unwrap(), 1);
}
