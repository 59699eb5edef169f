use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use roxy_service::{LoadError, Outcome, TransportError};
use roxy_test::HitCounter;

use crate::setup_loader;

#[tokio::test]
async fn test_load_and_cache() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("garbage_data/hello_world");

    let expected = Outcome::Payload(Bytes::from_static(b"hello_world"));
    assert_eq!(loader.request(&url).await, expected);
    assert_eq!(loader.request(&url).await, expected);
    assert_eq!(server.accesses(), 1);

    loader.clear_cache().await;
    assert_eq!(loader.request(&url).await, expected);
    assert_eq!(server.accesses(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_download() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("delay/200ms/garbage_data/shared");

    let outcomes = join_all((0..8).map(|_| loader.request(&url))).await;

    for outcome in outcomes {
        assert_eq!(outcome, Outcome::Payload(Bytes::from_static(b"shared")));
    }
    // one hit on the delay route, one on the redirect target
    assert_eq!(
        server.all_hits(),
        vec![
            ("/delay/200ms/garbage_data/shared".to_owned(), 1),
            ("/garbage_data/shared".to_owned(), 1),
        ]
    );
}

#[tokio::test]
async fn test_follows_redirects() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("redirect/garbage_data/target");

    assert_eq!(
        loader.request(&url).await,
        Outcome::Payload(Bytes::from_static(b"target"))
    );
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("respond_statuscode/500/broken.png");

    let expected = Outcome::Failed(LoadError::Transport(TransportError::Status(500)));
    assert_eq!(loader.request(&url).await, expected);
    assert_eq!(loader.request(&url).await, expected);
    assert_eq!(server.accesses(), 2);
}

#[tokio::test]
async fn test_empty_body() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("empty/nothing.png");

    assert_eq!(loader.request(&url).await, Outcome::Empty);
    assert_eq!(loader.request(&url).await, Outcome::Empty);
    assert_eq!(server.accesses(), 2);
}

#[tokio::test]
async fn test_download_timeout() {
    let loader = setup_loader(|config| {
        config.max_download_timeout = Duration::from_millis(100);
    });
    let server = HitCounter::new();
    let url = server.url("delay/1s/garbage_data/slow");

    assert_eq!(
        loader.request(&url).await,
        Outcome::Failed(LoadError::Transport(TransportError::Timeout(
            Duration::from_millis(100)
        )))
    );
    assert_eq!(loader.stats().active, 0);
}

#[tokio::test]
async fn test_connection_refused() {
    let loader = setup_loader(|_| {});

    // Bind and drop a listener to get a port that nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let url = format!("http://{addr}/image.png").parse().unwrap();

    let outcome = loader.request(&url).await;
    assert!(matches!(
        outcome,
        Outcome::Failed(LoadError::Transport(TransportError::Connection(_)))
    ));
}
