use std::time::Duration;

use bytes::Bytes;
use roxy_service::{LoadBinding, LoadState};
use roxy_test::HitCounter;

use crate::setup_loader;

#[tokio::test]
async fn test_binding_loads_once() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("garbage_data/image.png");

    let mut binding = LoadBinding::new();
    let expected = LoadState::Loaded {
        key: Some(url.clone()),
        payload: Some(Bytes::from_static(b"image.png")),
    };

    assert_eq!(binding.load(&loader, Some(url.clone())).await, &expected);
    loader.clear_cache().await;
    assert_eq!(binding.load(&loader, Some(url)).await, &expected);
    assert_eq!(server.accesses(), 1);

    assert_eq!(binding.load(&loader, None).await, &LoadState::Loaded {
        key: None,
        payload: None,
    });
}

#[tokio::test]
async fn test_binding_detach() {
    let loader = setup_loader(|_| {});
    let server = HitCounter::new();
    let url = server.url("delay/2s/garbage_data/image.png");

    let mut binding = LoadBinding::new();
    let load = tokio::time::timeout(
        Duration::from_millis(200),
        binding.load(&loader, Some(url.clone())),
    )
    .await;
    assert!(load.is_err());
    assert_eq!(binding.state(), &LoadState::Loading);

    // the load keeps running without anyone waiting for it
    assert_eq!(loader.stats().in_flight, 1);

    binding.detach(&loader);
    assert_eq!(loader.stats().in_flight, 0);
    assert_eq!(loader.stats().active, 0);
}
