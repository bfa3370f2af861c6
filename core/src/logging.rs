//! Tracing-subscriber initialisers, grounded on the teacher's
//! `core/src/logging.rs`: an `EnvFilter` defaulting to `INFO`, with either a
//! human-readable or a JSON-flattened `fmt` layer. This crate's event loops
//! log every suspension point and state transition spec.md §5/§7 name
//! (`warn` for transport errors, `error` for protocol violations/resync,
//! `info` for lifecycle) through these subscribers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Human-readable logging for local/interactive runs.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// JSON logging for aggregators / observability pipelines.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}
