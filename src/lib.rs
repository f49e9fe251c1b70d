//! Teachable KNN - train an image classifier live, from a camera.
//!
//! This is the main library crate. It provides the nearest-neighbor
//! classifier, dataset persistence, the capture loop and the session
//! commands a frontend drives.

pub mod capture;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod recorder;
pub mod storage;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging on stderr.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Teachable KNN v{}", env!("CARGO_PKG_VERSION"));
    }
}
