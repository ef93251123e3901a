//! # auto-unpack
//!
//! Watches a download folder and unpacks ZIP, RAR and 7z archives once their transfer
//! has finished.
//!
//! ## Pipeline
//!
//! - A new archive appears in the input directory (or is already there at startup).
//! - After a short grace period, the readiness detector looks for companion files such as
//!   `movie.zip.part`. No companions and a non-zero size means the file is ready.
//! - Ready archives are extracted into `output_dir/<stem>/`, trying the configured
//!   passwords in order when the archive is encrypted. The original is deleted only after
//!   a successful extraction.
//! - Everything else is parked and re-checked periodically until it is ready, disappears
//!   or exceeds the residency timeout.
//!
//! ## Quick Start
//!
//! ```no_run
//! use auto_unpack::{Config, FolderWatcher, PasswordList, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         input_dir: "/srv/downloads".into(),
//!         output_dir: "/srv/unpacked".into(),
//!         passwords: vec!["secret".to_string()],
//!         ..Default::default()
//!     };
//!
//!     let passwords = PasswordList::collect(&config.passwords, None).await;
//!     let mut watcher = FolderWatcher::new(config, passwords)?;
//!
//!     // Subscribe to events
//!     let mut events = watcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     watcher.start()?;
//!     run_with_shutdown(watcher).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Folder watching and the extraction pipeline
pub mod folder_watcher;
/// Parking queue for files still in transfer
pub mod parking;
/// Readiness detection through companion files
pub mod readiness;
/// Core types and events
pub mod types;
/// Extraction followed by removal of the original
pub mod unpacker;

// Re-export commonly used types
pub use config::{Config, ParkingConfig, ReadinessConfig};
pub use error::{BackendError, Error, Result};
pub use extraction::{ArchiveBackend, PasswordList, extract_archive};
pub use folder_watcher::{Appearance, FolderWatcher};
pub use parking::{ParkResult, ParkingQueue, Verdict};
pub use readiness::{Readiness, ReadinessDetector};
pub use types::{ArchiveType, Event, ExtractionOutcome, OutcomeKind, WatchedFile};
pub use unpacker::Unpacker;

/// Helper function to run the folder watcher with graceful signal handling.
///
/// Runs the event loop until a termination signal arrives (or the loop ends on its own),
/// then calls the watcher's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(mut watcher: FolderWatcher) {
    tokio::select! {
        _ = watcher.run() => {
            tracing::warn!("Folder watcher event loop ended unexpectedly");
        }
        _ = wait_for_signal() => {}
    }
    watcher.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
