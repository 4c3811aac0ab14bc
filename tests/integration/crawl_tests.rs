//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use miles::config::RunConfig;
use miles::crawler::Coordinator;
use miles::state::UrlState;
use miles::{FetchError, TaskError, WriteError};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with fast retries
fn create_test_config(seed: &str, destination: &Path) -> RunConfig {
    let mut config = RunConfig::new(seed, destination);
    config.fetch.retry_backoff_ms = 1;
    config.fetch.timeout_secs = 5;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

fn file(bytes: &[u8], mime: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(bytes.to_vec(), mime)
}

fn seed_of(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

/// Names of every entry in `dir`, sorted
fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read destination")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn url_paths(urls: impl IntoIterator<Item = url::Url>) -> BTreeSet<String> {
    urls.into_iter().map(|u| u.path().to_string()).collect()
}

#[tokio::test]
async fn test_crawl_downloads_only_accepted_types() {
    let mock_server = MockServer::start().await;

    // A links to B and an image
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/b">B</a><img src="/img.jpg"></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    // B links back to A and to a PDF
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(
            r#"<html><body><a href="/">A</a><a href="/doc.pdf">Doc</a></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img.jpg"))
        .respond_with(file(b"JPEGDATA", "image/jpeg"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Not an accepted type, must never be requested
    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(file(b"%PDF", "application/pdf"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let mut config = create_test_config(&seed_of(&mock_server), dest.path());
    config.workers = 2;
    config.accept_types(["jpg"]);

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let registry = coordinator.registry();
    let result = coordinator.run().await;

    assert!(!result.cancelled);
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(
        url_paths(result.pages.clone()),
        BTreeSet::from(["/".to_string(), "/b".to_string()])
    );
    assert_eq!(result.files_downloaded(), 1);
    assert_eq!(result.files[0].url.path(), "/img.jpg");
    assert_eq!(result.files[0].bytes, 8);
    assert_eq!(result.links_ignored, 1);

    assert_eq!(dir_entries(dest.path()), vec!["img.jpg"]);
    assert_eq!(fs::read(dest.path().join("img.jpg")).unwrap(), b"JPEGDATA");

    assert_eq!(registry.count(UrlState::PageDone), 2);
    assert_eq!(registry.count(UrlState::FileDone), 1);
    assert_eq!(registry.count(UrlState::InProgress), 0);
}

#[tokio::test]
async fn test_directory_page_resolves_relative_links() {
    let mock_server = MockServer::start().await;

    // Served only with the trailing slash, no redirect from /docs
    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html(
            r#"<img src="pic.jpg"><a href="guide/">Guide</a><a href="report.pdf?b=2&a=1">R</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/guide/"))
        .respond_with(html(r#"<a href="../">up</a><a href="/docs">same page</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/pic.jpg"))
        .respond_with(file(b"PIC", "image/jpeg"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/report.pdf"))
        .respond_with(file(b"%PDF", "application/pdf"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let seed = format!("{}/docs/", mock_server.uri());
    let config = create_test_config(&seed, dest.path());

    let result = Coordinator::new(config).unwrap().run().await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(
        url_paths(result.pages.clone()),
        BTreeSet::from(["/docs".to_string(), "/docs/guide".to_string()])
    );
    assert_eq!(result.files_downloaded(), 2);
    assert_eq!(dir_entries(dest.path()), vec!["pic.jpg", "report.pdf"]);

    // Requests use the discovered form, not the normalized identity
    let requested: BTreeSet<String> = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        })
        .collect();
    assert_eq!(
        requested,
        BTreeSet::from([
            "/docs/".to_string(),
            "/docs/guide/".to_string(),
            "/docs/pic.jpg".to_string(),
            "/docs/report.pdf?b=2&a=1".to_string(),
        ])
    );
}

#[tokio::test]
async fn test_missing_file_is_recorded_and_run_completes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/missing.jpg">gone</a><a href="/present.jpg">here</a>"#,
        ))
        .mount(&mock_server)
        .await;

    // 404 is final, so exactly one request
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/present.jpg"))
        .respond_with(file(b"ok", "image/jpeg"))
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let mut config = create_test_config(&seed_of(&mock_server), dest.path());
    config.accept_types(["jpg"]);

    let coordinator = Coordinator::new(config).unwrap();
    let registry = coordinator.registry();
    let result = coordinator.run().await;

    assert_eq!(result.pages_visited(), 1);
    assert_eq!(result.files_downloaded(), 1);
    assert_eq!(result.files_skipped, 1);
    assert_eq!(result.errors.len(), 1);

    let failed = &result.errors[0];
    assert_eq!(failed.url.path(), "/missing.jpg");
    assert!(matches!(
        failed.error,
        TaskError::Fetch {
            attempts: 1,
            source: FetchError::NotFound { status: 404 }
        }
    ));
    assert_eq!(registry.state(&failed.url), Some(UrlState::Failed));
    assert_eq!(dir_entries(dest.path()), vec!["present.jpg"]);
}

#[tokio::test]
async fn test_same_file_name_from_different_paths() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<img src="/a/img.jpg"><img src="/b/img.jpg">"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a/img.jpg"))
        .respond_with(file(b"first", "image/jpeg"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b/img.jpg"))
        .respond_with(file(b"second", "image/jpeg"))
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let mut config = create_test_config(&seed_of(&mock_server), dest.path());
    config.workers = 2;
    config.accept_types(["jpg"]);

    let result = Coordinator::new(config).unwrap().run().await;

    assert_eq!(result.files_downloaded(), 2);
    assert_eq!(dir_entries(dest.path()), vec!["img-1.jpg", "img.jpg"]);

    // Which URL wins the plain name depends on scheduling
    let contents: BTreeSet<Vec<u8>> = ["img.jpg", "img-1.jpg"]
        .iter()
        .map(|name| fs::read(dest.path().join(name)).unwrap())
        .collect();
    assert_eq!(
        contents,
        BTreeSet::from([b"first".to_vec(), b"second".to_vec()])
    );

    for downloaded in &result.files {
        let expected: &[u8] = if downloaded.url.path() == "/a/img.jpg" {
            b"first"
        } else {
            b"second"
        };
        assert_eq!(fs::read(&downloaded.path).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_download_is_byte_exact() {
    let mock_server = MockServer::start().await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(300_000).collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/files/blob.bin">blob</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/blob.bin"))
        .respond_with(file(&payload, "application/octet-stream"))
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let mut config = create_test_config(&seed_of(&mock_server), dest.path());
    config.accept_types(["bin"]);

    let result = Coordinator::new(config).unwrap().run().await;

    assert_eq!(result.bytes_downloaded(), payload.len() as u64);
    assert_eq!(fs::read(dest.path().join("blob.bin")).unwrap(), payload);
}

#[tokio::test]
async fn test_terminates_for_any_worker_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/p1">1</a><a href="/p2">2</a><a href="/p3">3</a>"#,
        ))
        .mount(&mock_server)
        .await;

    for i in 1..=3 {
        // Every page links to every other page and to its own file
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(html(&format!(
                r#"<a href="/">home</a><a href="/p1">1</a><a href="/p2">2</a>
                <a href="/p3">3</a><img src="/f{}.png">"#,
                i
            )))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/f{}.png", i)))
            .respond_with(file(format!("png{}", i).as_bytes(), "image/png"))
            .mount(&mock_server)
            .await;
    }

    for workers in [1, 2, 4, 8] {
        let dest = TempDir::new().unwrap();
        let mut config = create_test_config(&seed_of(&mock_server), dest.path());
        config.workers = workers;
        config.accept_types(["png"]);

        let coordinator = Coordinator::new(config).unwrap();
        let registry = coordinator.registry();
        let frontier = coordinator.frontier();

        let result = tokio::time::timeout(Duration::from_secs(30), coordinator.run())
            .await
            .unwrap_or_else(|_| panic!("crawl with {} workers did not terminate", workers));

        assert_eq!(result.pages_visited(), 4, "workers = {}", workers);
        assert_eq!(result.files_downloaded(), 3, "workers = {}", workers);
        assert!(result.errors.is_empty());
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.count(UrlState::InProgress), 0);
        assert!(frontier.is_quiescent());
        assert_eq!(
            dir_entries(dest.path()),
            vec!["f1.png", "f2.png", "f3.png"]
        );
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    // First two attempts fail, the third succeeds
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>finally</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let config = create_test_config(&seed_of(&mock_server), dest.path());

    let result = Coordinator::new(config).unwrap().run().await;

    assert_eq!(result.pages_visited(), 1);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let config = create_test_config(&seed_of(&mock_server), dest.path());

    let result = Coordinator::new(config).unwrap().run().await;

    assert_eq!(result.pages_visited(), 0);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        result.errors[0].error,
        TaskError::Fetch {
            attempts: 3,
            source: FetchError::ServerError { status: 500 }
        }
    ));
}

#[tokio::test]
async fn test_max_depth_limits_page_crawling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/level1">deeper</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/level1"))
        .respond_with(html(r#"<a href="/level2">deeper</a><img src="/pic.gif">"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Files linked from the last allowed level are still downloaded
    Mock::given(method("GET"))
        .and(path("/pic.gif"))
        .respond_with(file(b"GIF89a", "image/gif"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let mut config = create_test_config(&seed_of(&mock_server), dest.path());
    config.max_depth = Some(1);

    let result = Coordinator::new(config).unwrap().run().await;

    assert_eq!(result.pages_visited(), 2);
    assert_eq!(result.files_downloaded(), 1);
    assert_eq!(result.links_ignored, 1);
}

#[tokio::test]
async fn test_off_site_pages_are_not_crawled() {
    let mock_server = MockServer::start().await;
    let other_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<a href="{0}/elsewhere">page</a><img src="{0}/cdn/photo.png">"#,
            other_server.uri()
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(html("<p>other site</p>"))
        .expect(0)
        .mount(&other_server)
        .await;

    // Files may live on another host
    Mock::given(method("GET"))
        .and(path("/cdn/photo.png"))
        .respond_with(file(b"PNG", "image/png"))
        .expect(1)
        .mount(&other_server)
        .await;

    let dest = TempDir::new().unwrap();
    let config = create_test_config(&seed_of(&mock_server), dest.path());

    let result = Coordinator::new(config).unwrap().run().await;

    assert_eq!(result.pages_visited(), 1);
    assert_eq!(result.files_downloaded(), 1);
    assert_eq!(result.links_ignored, 1);
    assert_eq!(dir_entries(dest.path()), vec!["photo.png"]);
}

#[tokio::test]
async fn test_non_html_pages_are_not_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/feed">feed</a><a href="/search?q=x">s</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(br#"{"html": "<a href='/hidden'>x</a>"}"#.to_vec(), "application/json"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(html("<p>hidden</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Extension-less query URLs are ignored
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(html("<p>results</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let config = create_test_config(&seed_of(&mock_server), dest.path());

    let coordinator = Coordinator::new(config).unwrap();
    let registry = coordinator.registry();
    let result = coordinator.run().await;

    assert_eq!(result.pages_visited(), 2);
    assert_eq!(result.links_ignored, 1);
    assert_eq!(registry.count(UrlState::PageDone), 2);
}

#[tokio::test]
async fn test_cancellation_leaves_no_partial_files() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<img src="/slow1.jpg"><img src="/slow2.jpg"><img src="/slow3.jpg">"#,
        ))
        .mount(&mock_server)
        .await;

    // Downloads that cannot finish before the run is cancelled
    Mock::given(method("GET"))
        .respond_with(file(&[7u8; 4096], "image/jpeg").set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let dest = TempDir::new().unwrap();
    let mut config = create_test_config(&seed_of(&mock_server), dest.path());
    config.workers = 2;
    config.fetch.timeout_secs = 30;

    let coordinator = Coordinator::new(config).unwrap();
    let registry = coordinator.registry();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        });
    }

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.run_with_cancellation(token),
    )
    .await
    .expect("cancelled crawl did not stop promptly");

    assert!(result.cancelled);
    assert_eq!(result.pages_visited(), 1);
    assert_eq!(result.files_downloaded(), 0);
    assert_eq!(result.files_skipped, 3);
    assert!(result
        .errors
        .iter()
        .all(|failed| matches!(failed.error, TaskError::Cancelled)));
    assert_eq!(registry.count(UrlState::Failed), 3);
    assert_eq!(registry.count(UrlState::InProgress), 0);

    let leftovers: Vec<PathBuf> = fs::read_dir(dest.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
}

#[tokio::test]
async fn test_write_failure_is_recorded_and_run_completes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<img src="/a.jpg">"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(file(b"JPEG", "image/jpeg"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let config = create_test_config(&seed_of(&mock_server), &out);

    let coordinator = Coordinator::new(config).unwrap();
    let registry = coordinator.registry();

    // Destination disappears after startup, so every write fails
    fs::remove_dir(&out).unwrap();

    let result = coordinator.run().await;

    assert!(!result.cancelled);
    assert_eq!(result.pages_visited(), 1);
    assert_eq!(result.files_downloaded(), 0);
    assert_eq!(result.files_skipped, 1);
    assert_eq!(result.errors.len(), 1);

    let failed = &result.errors[0];
    assert_eq!(failed.url.path(), "/a.jpg");
    assert!(matches!(failed.error, TaskError::Write(WriteError::Io { .. })));
    assert_eq!(registry.state(&failed.url), Some(UrlState::Failed));
    assert_eq!(registry.count(UrlState::InProgress), 0);
}

#[tokio::test]
async fn test_invalid_destination_is_fatal() {
    let dest = TempDir::new().unwrap();
    let occupied = dest.path().join("not-a-dir");
    fs::write(&occupied, b"x").unwrap();

    let config = create_test_config("http://127.0.0.1:9/", &occupied);

    assert!(Coordinator::new(config).is_err());
}
