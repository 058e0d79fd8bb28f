//! HTTP page fetcher against a local mock server

use songcrew::tools::{HttpPageFetcher, HttpPageFetcherConfig, PageFetcher, ToolError};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(max_response_bytes: usize) -> HttpPageFetcher {
    HttpPageFetcher::new(HttpPageFetcherConfig {
        timeout: Duration::from_secs(5),
        max_response_bytes,
        ..HttpPageFetcherConfig::default()
    })
    .unwrap()
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{route}", server.uri())).unwrap()
}

#[tokio::test]
async fn test_plain_text_is_returned_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("The harbour lights went out in 1962."),
        )
        .mount(&server)
        .await;

    let page = fetcher(1024).fetch(&url(&server, "/notes.txt")).await.unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.text, "The harbour lights went out in 1962.");
}

#[tokio::test]
async fn test_html_is_reduced_to_readable_text() {
    let server = MockServer::start().await;
    let paragraph = "The lighthouse keeper wrote in his diary every night for forty years, \
                     recording storms, shipwrecks and the slow return of the seals.";
    let html = format!(
        "<html><head><title>Keeper</title><script>var x = 1;</script></head>\
         <body><article><h1>The Keeper</h1><p>{paragraph}</p><p>{paragraph}</p></article></body></html>"
    );
    Mock::given(method("GET"))
        .and(path("/keeper"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(&server)
        .await;

    let page = fetcher(64 * 1024).fetch(&url(&server, "/keeper")).await.unwrap();

    assert!(page.text.contains("lighthouse keeper wrote in his diary"));
    assert!(!page.text.contains("<p>"));
}

#[tokio::test]
async fn test_error_status_is_an_execution_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    match fetcher(1024).fetch(&url(&server, "/gone")).await.unwrap_err() {
        ToolError::ExecutionError(message) => assert!(message.contains("404")),
        other => panic!("expected ExecutionError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_pages_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("x".repeat(2048)),
        )
        .mount(&server)
        .await;

    let error = fetcher(1024).fetch(&url(&server, "/big")).await.unwrap_err();

    assert_eq!(
        error,
        ToolError::ResponseTooLarge {
            size: 2048,
            max: 1024
        }
    );
}

#[tokio::test]
async fn test_slow_pages_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let fetcher = HttpPageFetcher::new(HttpPageFetcherConfig {
        timeout: Duration::from_millis(100),
        ..HttpPageFetcherConfig::default()
    })
    .unwrap();

    let error = fetcher.fetch(&url(&server, "/slow")).await.unwrap_err();

    assert!(matches!(error, ToolError::Timeout(_)), "got {error:?}");
}
