use crate::error::BackendError;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::shared::{is_password_message, sanitize_entry_path};
use super::{ArchiveBackend, ArchiveHandle};

/// Archive backend for RAR files (RAR4 and RAR5, through the bundled unrar library)
pub struct RarBackend;

impl RarBackend {
    /// Convert an unrar error to a backend error, checking for password errors
    ///
    /// With a password supplied, damaged data usually means the key was wrong: RAR4 only
    /// notices a bad key through the CRC of the decoded entry.
    fn convert_unrar_error(
        e: unrar::error::UnrarError,
        archive_path: &Path,
        with_password: bool,
    ) -> BackendError {
        let debug_str = format!("{:?}", e).to_lowercase();

        if is_password_message(&debug_str) || (with_password && debug_str.contains("baddata")) {
            BackendError::BadPassword {
                archive: archive_path.to_path_buf(),
            }
        } else if ["eopen", "ecreate", "eclose", "eread", "ewrite"]
            .iter()
            .any(|code| debug_str.contains(code))
        {
            BackendError::io(archive_path, std::io::Error::other(e.to_string()))
        } else if debug_str.contains("unknownformat") {
            BackendError::Unsupported {
                archive: archive_path.to_path_buf(),
                reason: e.to_string(),
            }
        } else {
            BackendError::Corrupted {
                archive: archive_path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    }
}

impl ArchiveBackend for RarBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Rar
    }

    fn open(&self, archive_path: &Path) -> Result<ArchiveHandle, BackendError> {
        let listing = unrar::Archive::new(archive_path)
            .open_for_listing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path, false))?;

        let mut entry_count = 0;
        let mut encrypted = false;

        for entry in listing {
            match entry {
                Ok(header) => {
                    entry_count += 1;
                    encrypted |= header.is_encrypted();
                }
                Err(e) => match Self::convert_unrar_error(e, archive_path, false) {
                    // Header encryption: the listing itself needs the password
                    BackendError::BadPassword { .. } => {
                        encrypted = true;
                        break;
                    }
                    other => return Err(other),
                },
            }
        }

        debug!(?archive_path, entry_count, encrypted, "opened RAR archive");
        Ok(ArchiveHandle::new(archive_path, encrypted, entry_count))
    }

    fn extract_all(
        &self,
        handle: &ArchiveHandle,
        dest_path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<PathBuf>, BackendError> {
        let archive_path = handle.path();
        let with_password = password.is_some();
        debug!(
            ?archive_path,
            password_length = password.map(str::len),
            ?dest_path,
            "attempting RAR extraction"
        );

        let archive = match password {
            Some(password) => unrar::Archive::with_password(archive_path, password.as_bytes()),
            None => unrar::Archive::new(archive_path),
        };

        let processor = archive
            .open_for_processing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path, with_password))?;

        let mut extracted_files = Vec::new();

        // Process each entry using the state machine interface
        let mut at_header = processor;
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::convert_unrar_error(e, archive_path, with_password)),
            };

            let header = at_file.entry();

            // Entries like "../../etc/passwd" lose their non-normal components
            let Some(sanitized) = sanitize_entry_path(Path::new(&header.filename)) else {
                debug!(?archive_path, "skipping entry with no usable path");
                at_header = at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path, with_password))?;
                continue;
            };

            let file_path = dest_path.join(&sanitized);

            if header.is_directory() {
                std::fs::create_dir_all(&file_path)
                    .map_err(|e| BackendError::io(&file_path, e))?;
                at_header = at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path, with_password))?;
                continue;
            }

            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
            }

            at_header = at_file
                .extract_to(&file_path)
                .map_err(|e| Self::convert_unrar_error(e, archive_path, with_password))?;
            extracted_files.push(file_path);
        }

        extracted_files.sort();
        Ok(extracted_files)
    }
}
