//! Core types and events for auto-unpack

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveType {
    /// Detect the archive type from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();

        match ext.as_str() {
            "rar" => Some(ArchiveType::Rar),
            "7z" => Some(ArchiveType::SevenZip),
            "zip" => Some(ArchiveType::Zip),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArchiveType::Rar => "RAR",
            ArchiveType::SevenZip => "7z",
            ArchiveType::Zip => "ZIP",
        };
        f.write_str(name)
    }
}

/// An archive file observed in the input directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedFile {
    /// Path of the archive (identity)
    pub path: PathBuf,
    /// When the file was first observed
    pub detected_at: DateTime<Utc>,
    /// Size in bytes at the last readiness check
    pub last_known_size: u64,
    /// Format derived from the extension
    pub archive_type: ArchiveType,
}

impl WatchedFile {
    /// Start tracking `path`, if its extension names a supported format
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let archive_type = ArchiveType::from_path(&path)?;
        Some(Self {
            path,
            detected_at: Utc::now(),
            last_known_size: 0,
            archive_type,
        })
    }
}

/// Terminal classification of one extraction call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// All entries were written below the target directory
    Success {
        /// Extracted files (not directories)
        files: Vec<PathBuf>,
        /// Number of password candidates tried, including the one that worked.
        /// Zero when the archive opened without a password.
        password_attempts: usize,
    },
    /// No backend handles this file
    UnsupportedFormat,
    /// The archive is encrypted and none of the candidates opened it
    PasswordExhausted {
        /// Number of candidates tried
        attempted: usize,
    },
    /// The archive is structurally invalid
    Corrupted {
        /// What the backend reported
        reason: String,
    },
    /// Environmental failure (permissions, disk full, file vanished mid-read)
    IoError {
        /// What the backend reported
        reason: String,
    },
}

impl ExtractionOutcome {
    /// The payload-free tag of this outcome
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ExtractionOutcome::Success { .. } => OutcomeKind::Success,
            ExtractionOutcome::UnsupportedFormat => OutcomeKind::UnsupportedFormat,
            ExtractionOutcome::PasswordExhausted { .. } => OutcomeKind::PasswordExhausted,
            ExtractionOutcome::Corrupted { .. } => OutcomeKind::Corrupted,
            ExtractionOutcome::IoError { .. } => OutcomeKind::IoError,
        }
    }

    /// Whether the extraction succeeded (and the original may be removed)
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }

    /// Whether a later attempt on the same file could reasonably succeed
    ///
    /// Only I/O failures qualify. Corrupted and unsupported archives never change on their
    /// own, and an exhausted password list needs operator action first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionOutcome::IoError { .. })
    }
}

/// Outcome tag without payload, suitable for events and metrics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Extracted successfully
    Success,
    /// No backend for the format
    UnsupportedFormat,
    /// All password candidates failed
    PasswordExhausted,
    /// Archive structurally invalid
    Corrupted,
    /// Environmental failure
    IoError,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutcomeKind::Success => "success",
            OutcomeKind::UnsupportedFormat => "unsupported_format",
            OutcomeKind::PasswordExhausted => "password_exhausted",
            OutcomeKind::Corrupted => "corrupted",
            OutcomeKind::IoError => "io_error",
        };
        f.write_str(name)
    }
}

/// Event emitted while files move through the pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A supported archive appeared in the input directory
    Detected {
        /// Archive path
        path: PathBuf,
    },

    /// Archive deferred until its transfer completes
    Parked {
        /// Archive path
        path: PathBuf,
        /// Companion files present at park time (empty for zero-byte files)
        companions: Vec<PathBuf>,
    },

    /// Oldest parked entry dropped to make room for a new one
    Evicted {
        /// Archive path no longer tracked
        path: PathBuf,
    },

    /// Parked entry exceeded its residency timeout
    Expired {
        /// Archive path
        path: PathBuf,
        /// How long the entry was parked
        #[serde(with = "duration_secs")]
        parked_for: Duration,
    },

    /// Archive extraction finished with a definitive outcome
    Completed {
        /// Archive path
        path: PathBuf,
        /// Outcome tag
        outcome: OutcomeKind,
        /// Target directory of the extraction
        destination: PathBuf,
        /// When the outcome was recorded
        finished_at: DateTime<Utc>,
    },

    /// Original archive removed after successful extraction
    OriginalRemoved {
        /// Archive path
        path: PathBuf,
    },

    /// Removing the original archive failed (extraction itself succeeded)
    RemovalFailed {
        /// Archive path
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Watcher shut down
    Shutdown,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
