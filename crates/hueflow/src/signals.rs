//! Process signals
//!
//! Ctrl-C / SIGINT requests an orderly shutdown. SIGHUP prints the current
//! throughput without stopping.

use hueflow_core::GlobalResults;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

pub fn install(runtime: &Handle, stop: Arc<AtomicBool>, results: Arc<GlobalResults>) {
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                // Keep the report off the ^C line.
                println!();
                info!("Interrupt received, shutting down.");
                stop.store(true, Ordering::Release);
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    #[cfg(unix)]
    runtime.spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("Cannot listen for SIGHUP: {}", e);
                return;
            }
        };
        while hangup.recv().await.is_some() {
            println!("Results so far:\n{}", results.throughput());
        }
    });

    #[cfg(not(unix))]
    drop(results);
}
