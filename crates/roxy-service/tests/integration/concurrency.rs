use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::join_all;
use roxy_service::Outcome;
use roxy_test::HitCounter;

use crate::setup_loader;

#[tokio::test]
async fn test_concurrency_ceiling() {
    let loader = setup_loader(|config| config.max_concurrent_fetches = 2);
    let server = HitCounter::new();
    let urls: Vec<_> = (0..4)
        .map(|i| server.url(&format!("delay/300ms/garbage_data/{i}")))
        .collect();

    let start = Instant::now();
    let outcomes = join_all(urls.iter().map(|url| loader.request(url))).await;
    let elapsed = start.elapsed();

    for (i, outcome) in outcomes.into_iter().enumerate() {
        assert_eq!(outcome, Outcome::Payload(Bytes::from(i.to_string())));
    }
    // two rounds of two concurrent downloads
    assert!(elapsed >= Duration::from_millis(600), "took {elapsed:?}");
    assert_eq!(loader.stats().active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queued_requests_finish_in_order() {
    let loader = setup_loader(|config| config.max_concurrent_fetches = 1);
    let server = HitCounter::new();

    let mut requests = vec![];
    for i in 0..4 {
        let loader = loader.clone();
        let url = server.url(&format!("delay/100ms/garbage_data/{i}"));
        requests.push(tokio::spawn(async move {
            let outcome = loader.request(&url).await;
            (outcome, Instant::now())
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut finished = vec![];
    for (i, request) in requests.into_iter().enumerate() {
        let (outcome, at) = request.await.unwrap();
        assert_eq!(outcome, Outcome::Payload(Bytes::from(i.to_string())));
        finished.push(at);
    }
    assert!(finished.windows(2).all(|pair| pair[0] < pair[1]));
}
