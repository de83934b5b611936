//! Converge CLI support
//!
//! Scenario files, state documents and log setup behind the `converge`
//! binary.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod document;
pub mod scenario;

pub use document::{check_files, load_document};
pub use scenario::{run_scenario, Scenario};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG` filter (default `info`), logs on stderr
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = installed {
        eprintln!("tracing already initialized: {err}");
    }
}
