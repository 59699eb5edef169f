//! Loads a list of URLs concurrently through a single deduplicating loader.

use roxy_service::logging;

mod cli;
mod load;
mod output;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
