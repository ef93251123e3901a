//! Archive extraction with password support
//!
//! This module extracts RAR, 7z, and ZIP archives into `output_root/<stem>`, trying
//! password candidates in order when an archive is encrypted.
//!
//! Each format lives behind the [`ArchiveBackend`] trait. The retry algorithm in
//! [`extract_with_passwords`] only talks to that trait, so adding a format means adding one
//! backend and one entry in the extension table.

mod password_list;
mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use password_list::PasswordList;
pub use rar::RarBackend;
pub use sevenz::SevenZipBackend;
pub use shared::{extract_with_passwords, target_dir};
pub use zip::ZipBackend;

use crate::error::BackendError;
use crate::types::{ArchiveType, ExtractionOutcome};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{info, warn};

/// Result of opening an archive: what the backend learned without extracting anything
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveHandle {
    path: PathBuf,
    encrypted: bool,
    entry_count: usize,
}

impl ArchiveHandle {
    /// Describe an opened archive
    pub fn new(path: impl Into<PathBuf>, encrypted: bool, entry_count: usize) -> Self {
        Self {
            path: path.into(),
            encrypted,
            entry_count,
        }
    }

    /// Path of the archive on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backend saw encrypted entries or encrypted headers while opening
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Number of entries the backend listed (0 when the listing itself is encrypted)
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}

/// Format-specific archive operations
///
/// Implementations are stateless: every call opens the archive afresh, so two calls with
/// the same inputs behave the same way.
pub trait ArchiveBackend: Send + Sync {
    /// Format handled by this backend
    fn archive_type(&self) -> ArchiveType;

    /// Open the archive and inspect it without extracting
    ///
    /// Fails with [`BackendError::Corrupted`] for structurally invalid input,
    /// [`BackendError::Unsupported`] for format features the backend cannot read and
    /// [`BackendError::Io`] when the file cannot be read at all.
    fn open(&self, archive: &Path) -> Result<ArchiveHandle, BackendError>;

    /// Whether extraction will certainly need a password
    ///
    /// `false` does not guarantee the archive is unencrypted; some formats only reveal
    /// encryption while decoding.
    fn needs_password(&self, handle: &ArchiveHandle) -> bool {
        handle.is_encrypted()
    }

    /// Extract every entry below `dest`, returning the written files
    ///
    /// A rejected or missing password is reported as [`BackendError::BadPassword`].
    fn extract_all(
        &self,
        handle: &ArchiveHandle,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<Vec<PathBuf>, BackendError>;
}

/// Lowercase extension to backend
static BACKENDS: [(&str, &dyn ArchiveBackend); 3] = [
    ("zip", &ZipBackend),
    ("rar", &RarBackend),
    ("7z", &SevenZipBackend),
];

/// Look up the backend for a path by its (case-insensitive) extension
pub fn backend_for(path: &Path) -> Option<&'static dyn ArchiveBackend> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    BACKENDS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, backend)| *backend)
}

/// Check whether a path has an extension some backend handles
pub fn is_supported(path: &Path) -> bool {
    backend_for(path).is_some()
}

/// Unified archive extraction dispatcher
///
/// Routes to the backend registered for the file's extension and runs the password retry
/// algorithm on the blocking thread pool.
///
/// # Arguments
/// * `archive_path` - Path to the archive file
/// * `output_root` - Directory receiving the `<stem>` sub-directory
/// * `passwords` - Candidates to try (in order) if the archive is encrypted
///
/// # Example
/// ```no_run
/// use auto_unpack::extraction::{extract_archive, PasswordList};
/// use std::path::Path;
///
/// # async fn example() {
/// let passwords = PasswordList::new(["pass123"]);
/// let outcome = extract_archive(
///     Path::new("/downloads/movie.rar"),
///     Path::new("/download_files"),
///     &passwords,
/// )
/// .await;
/// println!("outcome: {}", outcome.kind());
/// # }
/// ```
pub async fn extract_archive(
    archive_path: &Path,
    output_root: &Path,
    passwords: &PasswordList,
) -> ExtractionOutcome {
    let Some(backend) = backend_for(archive_path) else {
        warn!(?archive_path, "no backend for archive extension");
        return ExtractionOutcome::UnsupportedFormat;
    };

    info!(
        ?archive_path,
        archive_type = %backend.archive_type(),
        "dispatching extraction to {} backend",
        backend.archive_type()
    );

    let archive_owned = archive_path.to_path_buf();
    let output_owned = output_root.to_path_buf();
    let passwords_owned = passwords.clone();

    spawn_blocking(move || {
        extract_with_passwords(backend, &archive_owned, &output_owned, &passwords_owned)
    })
    .await
    .unwrap_or_else(|e| ExtractionOutcome::IoError {
        reason: format!("extraction task panicked: {}", e),
    })
}
