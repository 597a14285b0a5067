//! HTTP fetcher tests against a local server

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use bytes::Bytes;

use modlog_core::AttachmentInfo;
use modlog_fetch::{
    AttachmentSource, FetchConfig, FetchOutcome, HttpFetcher, SkipReason, fetch_attachments,
};

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::SERVICE_UNAVAILABLE, "try again")
    } else {
        (StatusCode::OK, "recovered")
    }
}

async fn unbounded() -> Body {
    // Chunked body, so no Content-Length is sent
    let chunks = (0..8).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![7u8; 16])));
    Body::from_stream(futures::stream::iter(chunks))
}

/// Start the test server and return its base url plus the flaky hit counter
async fn start_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/small.txt", get(|| async { "hello" }))
        .route("/large.bin", get(|| async { vec![0u8; 64] }))
        .route("/chunked.bin", get(unbounded))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route("/flaky", get(flaky))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(FetchConfig::default().with_timeout(Duration::from_secs(1))).unwrap()
}

#[tokio::test]
async fn test_fetch_small_payload() {
    let (base, _) = start_server().await;
    let outcome = fetcher().fetch(&format!("{base}/small.txt"), 1024).await;
    assert_eq!(outcome, FetchOutcome::Fetched(Bytes::from_static(b"hello")));
}

#[tokio::test]
async fn test_content_length_over_cap() {
    let (base, _) = start_server().await;
    let outcome = fetcher().fetch(&format!("{base}/large.bin"), 16).await;
    assert_eq!(
        outcome,
        FetchOutcome::Skipped(SkipReason::ContentLengthTooLarge {
            length: 64,
            limit: 16
        })
    );
}

#[tokio::test]
async fn test_streamed_body_over_cap() {
    let (base, _) = start_server().await;
    let fetcher = fetcher();

    let outcome = fetcher.fetch(&format!("{base}/chunked.bin"), 100).await;
    assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::BodyTooLarge { limit: 100 }));

    let outcome = fetcher.fetch(&format!("{base}/chunked.bin"), 128).await;
    assert_eq!(outcome.bytes().map(|b| b.len()), Some(128));
}

#[tokio::test]
async fn test_non_success_status() {
    let (base, _) = start_server().await;
    let outcome = fetcher().fetch(&format!("{base}/missing"), 1024).await;
    assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::Status(404)));
}

#[tokio::test]
async fn test_timeout() {
    let (base, _) = start_server().await;
    let outcome = fetcher().fetch(&format!("{base}/slow"), 1024).await;
    assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::Timeout));
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = fetcher().fetch(&format!("http://{addr}/x"), 1024).await;
    assert!(matches!(outcome, FetchOutcome::Skipped(SkipReason::Network(_))));
}

#[tokio::test]
async fn test_server_error_without_retries() {
    let (base, hits) = start_server().await;
    let outcome = fetcher().fetch(&format!("{base}/flaky"), 1024).await;
    assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::Status(503)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_with_retry() {
    let (base, hits) = start_server().await;
    let fetcher = HttpFetcher::new(FetchConfig::default().with_retries(2)).unwrap();

    let outcome = fetcher.fetch(&format!("{base}/flaky"), 1024).await;
    assert_eq!(outcome, FetchOutcome::Fetched(Bytes::from_static(b"recovered")));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

/// An attachment whose declared size is over the cap yields no stored bytes
#[tokio::test]
async fn test_fetch_attachments_mixed() {
    let (base, _) = start_server().await;
    let fetcher = fetcher();

    let attachments = vec![
        AttachmentInfo::new("small.txt", format!("{base}/small.txt"), 5),
        AttachmentInfo::new("declared.bin", format!("{base}/small.txt"), 20 * 1024 * 1024),
        AttachmentInfo::new("missing", format!("{base}/missing"), 5),
        AttachmentInfo::new("again.txt", format!("{base}/small.txt"), 5),
    ];

    let stored = fetch_attachments(&fetcher, &attachments, 10 * 1024 * 1024, 2).await;
    let names: Vec<_> = stored.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["small.txt", "again.txt"]);
    assert!(stored.iter().all(|a| a.data.as_ref() == b"hello"));
}
