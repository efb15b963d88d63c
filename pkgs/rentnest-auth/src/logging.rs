//! Tracing setup for hosts embedding the engine

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber. `RUST_LOG` overrides `default_directive`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
