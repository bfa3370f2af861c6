//! Graceful shutdown vocabulary (spec.md §5 "Cancellation and timeouts":
//! SIGINT/SIGTERM stop accepting new work, in-flight commands finish, durable
//! state is flushed). Grounded on the teacher's `core/src/shutdown.rs`
//! `SyncShutdown`/`AsyncShutdown` traits and `Shutdown` marker type.

use serde::{Deserialize, Serialize};
use std::future::Future;

/// A component that can shut down immediately, with no async operations.
pub trait SyncShutdown {
    type Result;
    fn shutdown(&mut self) -> Self::Result;
}

/// A component whose shutdown needs to await something (flush a buffer,
/// close a connection, wait for in-flight work).
pub trait AsyncShutdown {
    type Result;
    fn shutdown(&mut self) -> impl Future<Output = Self::Result>;
}

/// Signal that a graceful shutdown has been requested.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize,
)]
pub struct Shutdown;

/// Resolves once SIGINT or SIGTERM is received (spec.md §5). Every process
/// entry point in [`crate::system`] races its main loop against this.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
