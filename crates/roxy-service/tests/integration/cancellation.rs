use std::time::Duration;

use bytes::Bytes;
use roxy_service::{LoadError, Outcome};
use roxy_test::HitCounter;

use crate::setup_loader;

#[tokio::test]
async fn test_cancel_running_download() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("delay/2s/garbage_data/slow");

    let request = tokio::spawn({
        let loader = loader.clone();
        let url = url.clone();
        async move { loader.request(&url).await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(loader.stats().active, 1);

    loader.cancel(&url);

    let outcome = tokio::time::timeout(Duration::from_millis(500), request)
        .await
        .expect("cancellation should settle the request right away")
        .unwrap();
    assert_eq!(outcome, Outcome::Failed(LoadError::Cancelled));
    assert_eq!(loader.stats().active, 0);
    assert_eq!(loader.stats().in_flight, 0);

    // the redirect target was never reached
    assert_eq!(
        server.all_hits(),
        vec![("/delay/2s/garbage_data/slow".to_owned(), 1)]
    );
}

#[tokio::test]
async fn test_cancel_queued_download() {
    let loader = setup_loader(|config| config.max_concurrent_fetches = 1);
    let server = HitCounter::new();
    let slow = server.url("delay/300ms/garbage_data/slow");
    let queued = server.url("garbage_data/queued");

    let spawn_request = |url: &url::Url| {
        let loader = loader.clone();
        let url = url.clone();
        tokio::spawn(async move { loader.request(&url).await })
    };

    let first = spawn_request(&slow);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = spawn_request(&queued);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(loader.stats().queued, 1);

    loader.cancel(&queued);
    assert_eq!(second.await.unwrap(), Outcome::Failed(LoadError::Cancelled));
    assert_eq!(
        first.await.unwrap(),
        Outcome::Payload(Bytes::from_static(b"slow"))
    );

    // the cancelled load never reached the server
    let hits = server.all_hits();
    assert!(hits.iter().all(|(uri, _)| uri != "/garbage_data/queued"));
}

#[tokio::test]
async fn test_request_after_cancel_starts_fresh() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("delay/200ms/garbage_data/again");

    let request = tokio::spawn({
        let loader = loader.clone();
        let url = url.clone();
        async move { loader.request(&url).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    loader.cancel(&url);
    assert_eq!(
        request.await.unwrap(),
        Outcome::Failed(LoadError::Cancelled)
    );

    assert_eq!(
        loader.request(&url).await,
        Outcome::Payload(Bytes::from_static(b"again"))
    );
}
