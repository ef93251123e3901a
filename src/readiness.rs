//! Readiness detection for files still being transferred
//!
//! Download tools write a sidecar next to the file while the transfer runs
//! (`movie.zip.part`, `movie.zip.crdownload`, ...). A file is ready once none of those
//! companions exist and it has a non-zero size.

use crate::config::ReadinessConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Classification of a file at one point in time
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The file no longer exists
    Vanished,
    /// The file exists but has no content yet
    Empty,
    /// Companion files show the transfer is still running
    Pending {
        /// Sidecars found next to the file
        companions: Vec<PathBuf>,
    },
    /// No companions and a non-zero size
    Ready {
        /// Size in bytes at inspection time
        size: u64,
    },
}

impl Readiness {
    /// Whether the file can be extracted now
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Decides whether a file has finished arriving
#[derive(Clone, Debug)]
pub struct ReadinessDetector {
    suffixes: Vec<String>,
    grace_period: Duration,
}

impl ReadinessDetector {
    /// Create a detector from its configuration section
    pub fn new(config: &ReadinessConfig) -> Self {
        Self {
            suffixes: config.companion_suffixes.clone(),
            grace_period: config.grace_period,
        }
    }

    /// One-time wait applied by [`detect`](Self::detect)
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Companion files of `path` that currently exist
    ///
    /// Each suffix is appended to the full file name, extension included, so
    /// `movie.zip` has the candidate `movie.zip.part`.
    pub fn companions(&self, path: &Path) -> Vec<PathBuf> {
        self.suffixes
            .iter()
            .map(|suffix| {
                let mut name = OsString::from(path.as_os_str());
                name.push(suffix);
                PathBuf::from(name)
            })
            .filter(|candidate| candidate.exists())
            .collect()
    }

    /// Whether no companion file exists
    pub fn is_ready(&self, path: &Path) -> bool {
        self.companions(path).is_empty()
    }

    /// Classify `path` right now
    pub fn inspect(&self, path: &Path) -> Readiness {
        let size = match std::fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(_) => return Readiness::Vanished,
        };

        let companions = self.companions(path);
        if !companions.is_empty() {
            return Readiness::Pending { companions };
        }

        if size == 0 {
            Readiness::Empty
        } else {
            Readiness::Ready { size }
        }
    }

    /// Wait the grace period once, then classify `path`
    ///
    /// Producers sometimes create their sidecar just after the main file, so checking
    /// immediately would misreport an active transfer as finished.
    pub async fn detect(&self, path: &Path) -> Readiness {
        if !path.exists() {
            return Readiness::Vanished;
        }

        if !self.grace_period.is_zero() {
            tokio::time::sleep(self.grace_period).await;
        }

        let readiness = self.inspect(path);
        debug!(?path, ?readiness, "readiness check");
        readiness
    }
}
