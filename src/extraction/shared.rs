use crate::error::BackendError;
use crate::types::ExtractionOutcome;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use super::ArchiveBackend;
use super::password_list::PasswordList;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Target directory for an archive: `output_root/<file stem>`
///
/// Returns `None` when the path has no usable file name.
pub fn target_dir(archive_path: &Path, output_root: &Path) -> Option<PathBuf> {
    let stem = archive_path.file_stem()?;
    if stem.is_empty() {
        return None;
    }
    Some(output_root.join(stem))
}

/// Shared implementation of the password retry algorithm.
///
/// 1. Open the archive through `backend`.
/// 2. Unless the backend already knows a password is required, extract without one.
/// 3. On a password failure, try each candidate in order and stop at the first success.
/// 4. Any non-password failure ends the attempt immediately with its own outcome.
///
/// A target directory created by this call is removed again when the outcome is not
/// `Success`, so a failed archive never leaves output that looks finished.
///
/// Blocking; [`extract_archive`](super::extract_archive) runs it on the blocking pool.
pub fn extract_with_passwords(
    backend: &dyn ArchiveBackend,
    archive_path: &Path,
    output_root: &Path,
    passwords: &PasswordList,
) -> ExtractionOutcome {
    let Some(dest_path) = target_dir(archive_path, output_root) else {
        warn!(?archive_path, "archive has no file stem, cannot name output directory");
        return ExtractionOutcome::UnsupportedFormat;
    };

    let created = !dest_path.exists();
    if let Err(e) = std::fs::create_dir_all(&dest_path) {
        warn!(?dest_path, error = %e, "failed to create destination");
        return ExtractionOutcome::IoError {
            reason: format!("failed to create destination {}: {}", dest_path.display(), e),
        };
    }

    let outcome = run_attempts(backend, archive_path, &dest_path, passwords);

    if !outcome.is_success()
        && created
        && let Err(e) = std::fs::remove_dir_all(&dest_path)
    {
        warn!(
            ?dest_path,
            error = %e,
            "failed to remove output directory of unsuccessful extraction"
        );
    }

    outcome
}

fn run_attempts(
    backend: &dyn ArchiveBackend,
    archive_path: &Path,
    dest_path: &Path,
    passwords: &PasswordList,
) -> ExtractionOutcome {
    let format_name = backend.archive_type();

    let handle = match backend.open(archive_path) {
        Ok(handle) => handle,
        // Encrypted headers: nothing can be listed without the password
        Err(BackendError::BadPassword { .. }) => {
            super::ArchiveHandle::new(archive_path, true, 0)
        }
        Err(e) => {
            warn!(?archive_path, error = %e, "failed to open {} archive", format_name);
            return outcome_for_failure(e);
        }
    };

    if backend.needs_password(&handle) {
        debug!(
            ?archive_path,
            entry_count = handle.entry_count(),
            "{} archive is encrypted",
            format_name
        );
    } else {
        match backend.extract_all(&handle, dest_path, None) {
            Ok(files) => {
                info!(
                    ?archive_path,
                    extracted_count = files.len(),
                    "{} extraction successful without password",
                    format_name
                );
                return ExtractionOutcome::Success {
                    files,
                    password_attempts: 0,
                };
            }
            Err(e) if e.is_password_error() => {
                debug!(?archive_path, "{} archive requires a password", format_name);
            }
            Err(e) => {
                warn!(
                    ?archive_path,
                    error = %e,
                    "{} extraction failed with non-password error",
                    format_name
                );
                return outcome_for_failure(e);
            }
        }
    }

    if passwords.is_empty() {
        warn!(
            ?archive_path,
            "archive is encrypted and no passwords are configured"
        );
        return ExtractionOutcome::PasswordExhausted { attempted: 0 };
    }

    info!(
        ?archive_path,
        password_count = passwords.len(),
        "attempting {} extraction with {} password(s)",
        format_name,
        passwords.len()
    );

    for (i, password) in passwords.iter().enumerate() {
        debug!(
            ?archive_path,
            attempt = i + 1,
            total = passwords.len(),
            password_length = password.len(),
            "trying password {}/{}",
            i + 1,
            passwords.len()
        );

        match backend.extract_all(&handle, dest_path, Some(password)) {
            Ok(files) => {
                info!(
                    ?archive_path,
                    attempt = i + 1,
                    extracted_count = files.len(),
                    "{} extraction successful on attempt {}/{}",
                    format_name,
                    i + 1,
                    passwords.len()
                );
                return ExtractionOutcome::Success {
                    files,
                    password_attempts: i + 1,
                };
            }
            Err(e) if e.is_password_error() => {
                debug!(?archive_path, attempt = i + 1, "wrong password, trying next");
                continue;
            }
            Err(e) => {
                // Corrupt archive, disk full, etc. No further candidate can fix that.
                warn!(
                    ?archive_path,
                    error = %e,
                    "{} extraction failed with non-password error",
                    format_name
                );
                return outcome_for_failure(e);
            }
        }
    }

    warn!(
        ?archive_path,
        attempted = passwords.len(),
        "all passwords failed for {} extraction",
        format_name
    );
    ExtractionOutcome::PasswordExhausted {
        attempted: passwords.len(),
    }
}

/// Map a terminal backend failure to its outcome
fn outcome_for_failure(error: BackendError) -> ExtractionOutcome {
    match error {
        BackendError::Unsupported { .. } => ExtractionOutcome::UnsupportedFormat,
        BackendError::Corrupted { .. } => ExtractionOutcome::Corrupted {
            reason: error.to_string(),
        },
        BackendError::BadPassword { .. } => ExtractionOutcome::PasswordExhausted { attempted: 0 },
        BackendError::Io { .. } => ExtractionOutcome::IoError {
            reason: error.to_string(),
        },
    }
}

/// Check whether a backend error message talks about passwords or encryption
///
/// Callers pass the lowercased `Debug` or `Display` text of a format crate's error; the
/// variant names (`MissingPassword`, `PasswordRequired`, `MaybeBadPassword`, ...) all
/// contain one of these words.
pub(crate) fn is_password_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("password") || lower.contains("encrypted")
}

/// Check whether an I/O error description points at bad archive data rather than the
/// environment (decoder errors, checksum mismatches, truncation)
pub(crate) fn is_data_error_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("kind: invaliddata")
        || lower.contains("kind: invalidinput")
        || lower.contains("kind: unexpectedeof")
        || lower.contains("checksum")
        || lower.contains("crc")
}

/// Reduce an archive entry name to its normal components
///
/// Drops root, prefix, `.` and `..` parts so an entry like `../../etc/passwd` lands at
/// `etc/passwd` below the destination. Returns `None` when nothing is left.
pub(crate) fn sanitize_entry_path(name: &Path) -> Option<PathBuf> {
    let sanitized = name
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Which side of an entry copy failed
#[derive(Debug)]
pub(crate) enum CopyError {
    /// Reading or decoding the archive entry
    Read(std::io::Error),
    /// Writing the output file
    Write(std::io::Error),
}

/// Copy one entry to its output file, keeping track of which side failed
pub(crate) fn copy_entry<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }
}

/// Classify a failed entry copy
///
/// Write failures are always I/O errors on the output file. A decode failure after a
/// password was accepted usually means the key was wrong (ZipCrypto checks a single byte,
/// AES in 7z has no check at all), so it counts as a bad password.
pub(crate) fn entry_copy_error(
    error: CopyError,
    archive_path: &Path,
    file_path: &Path,
    with_password: bool,
) -> BackendError {
    match error {
        CopyError::Write(e) => BackendError::io(file_path, e),
        CopyError::Read(e) if with_password => {
            debug!(?archive_path, error = %e, "entry decode failed after password check");
            BackendError::BadPassword {
                archive: archive_path.to_path_buf(),
            }
        }
        CopyError::Read(e) if is_data_error_message(&format!("{:?}", e)) => {
            BackendError::Corrupted {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to decode entry {}: {}", file_path.display(), e),
            }
        }
        CopyError::Read(e) => BackendError::io(archive_path, e),
    }
}
