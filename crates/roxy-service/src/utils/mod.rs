pub mod defer;
pub mod futures;
pub mod http;
