// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod binding;
pub mod cancellation;
pub mod concurrency;
pub mod http_loading;
pub mod utils;

pub use utils::*;
