//! Extraction of one ready archive, followed by removal of the original

use crate::extraction::{PasswordList, extract_archive, target_dir};
use crate::types::{Event, ExtractionOutcome};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Runs the extraction engine for ready archives
///
/// The original archive is deleted if and only if extraction succeeded.
#[derive(Clone, Debug)]
pub struct Unpacker {
    output_root: PathBuf,
    passwords: PasswordList,
    event_tx: broadcast::Sender<Event>,
}

impl Unpacker {
    /// Create an unpacker writing below `output_root`
    pub fn new(
        output_root: PathBuf,
        passwords: PasswordList,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            output_root,
            passwords,
            event_tx,
        }
    }

    /// Extract `path`, report the outcome and remove the original on success
    pub async fn process(&self, path: &Path) -> ExtractionOutcome {
        let outcome = extract_archive(path, &self.output_root, &self.passwords).await;
        let destination =
            target_dir(path, &self.output_root).unwrap_or_else(|| self.output_root.clone());

        match &outcome {
            ExtractionOutcome::Success {
                files,
                password_attempts,
            } => {
                info!(
                    ?path,
                    ?destination,
                    file_count = files.len(),
                    password_attempts,
                    "extracted archive"
                );
            }
            ExtractionOutcome::IoError { reason } => {
                warn!(?path, reason = %reason, "extraction failed with I/O error, original kept");
            }
            other => {
                warn!(?path, outcome = %other.kind(), "extraction unsuccessful, original kept");
            }
        }

        self.event_tx
            .send(Event::Completed {
                path: path.to_path_buf(),
                outcome: outcome.kind(),
                destination,
                finished_at: Utc::now(),
            })
            .ok();

        if outcome.is_success() {
            self.remove_original(path).await;
        }

        outcome
    }

    /// Delete the original archive after a successful extraction
    ///
    /// Failure is logged and reported as [`Event::RemovalFailed`]; the extracted output
    /// stays in place either way.
    pub async fn remove_original(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => {
                info!(?path, "removed original archive");
                self.event_tx
                    .send(Event::OriginalRemoved {
                        path: path.to_path_buf(),
                    })
                    .ok();
                true
            }
            Err(e) => {
                error!(?path, error = %e, "failed to remove original archive");
                self.event_tx
                    .send(Event::RemovalFailed {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    })
                    .ok();
                false
            }
        }
    }
}
