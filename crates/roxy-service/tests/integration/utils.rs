use roxy_service::Loader;
use roxy_service::config::Config;

/// Creates a [`Loader`] with the default HTTP fetcher and in-memory cache.
///
/// The `update_config` closure can modify any default configuration if needed before the
/// loader is created.
pub fn setup_loader(update_config: impl FnOnce(&mut Config)) -> Loader {
    roxy_test::setup();

    let mut config = Config::default();
    update_config(&mut config);

    Loader::from_config(&config)
}
