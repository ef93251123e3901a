use crate::error::BackendError;
use crate::types::ArchiveType;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::shared::{
    copy_entry, entry_copy_error, is_data_error_message, is_password_message,
    sanitize_entry_path,
};
use super::{ArchiveBackend, ArchiveHandle};

/// Signature at the start of every 7z archive
const SEVEN_ZIP_SIGNATURE: [u8; 6] = [b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C];

/// Archive backend for 7z files
///
/// Opening only checks the signature. Whether the archive is encrypted is learned from
/// the first extraction attempt. Entries are written one by one so unsafe names can be
/// skipped and only the files of this archive are reported.
pub struct SevenZipBackend;

impl SevenZipBackend {
    /// Write one entry below `dest_path`, returning the file path for regular files
    fn write_entry(
        entry: &sevenz_rust::SevenZArchiveEntry,
        data: &mut dyn Read,
        dest_path: &Path,
        archive_path: &Path,
        with_password: bool,
    ) -> Result<Option<PathBuf>, BackendError> {
        let Some(relative) = sanitize_entry_path(Path::new(entry.name())) else {
            warn!(?archive_path, entry = entry.name(), "skipping entry with unsafe path");
            return Ok(None);
        };
        let file_path = dest_path.join(relative);

        if entry.is_directory() {
            std::fs::create_dir_all(&file_path).map_err(|e| BackendError::io(&file_path, e))?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
        }

        let mut outfile =
            std::fs::File::create(&file_path).map_err(|e| BackendError::io(&file_path, e))?;
        copy_entry(data, &mut outfile)
            .map_err(|e| entry_copy_error(e, archive_path, &file_path, with_password))?;

        Ok(Some(file_path))
    }

    /// Classify a sevenz-rust error by its variant name
    fn convert_sevenz_error(
        e: sevenz_rust::Error,
        archive_path: &Path,
        with_password: bool,
    ) -> BackendError {
        let debug_str = format!("{:?}", e).to_lowercase();

        if is_password_message(&debug_str) {
            return BackendError::BadPassword {
                archive: archive_path.to_path_buf(),
            };
        }

        let data_error = is_data_error_message(&debug_str);

        // AES with a wrong key decodes to garbage that fails the stream checks
        if with_password && data_error {
            return BackendError::BadPassword {
                archive: archive_path.to_path_buf(),
            };
        }

        if data_error || debug_str.starts_with("badsignature") {
            BackendError::Corrupted {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            }
        } else if debug_str.starts_with("io(") || debug_str.starts_with("fileopen(") {
            BackendError::io(archive_path, std::io::Error::other(e.to_string()))
        } else if debug_str.starts_with("unsupported") {
            BackendError::Unsupported {
                archive: archive_path.to_path_buf(),
                reason: e.to_string(),
            }
        } else {
            BackendError::Corrupted {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            }
        }
    }
}

impl ArchiveBackend for SevenZipBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::SevenZip
    }

    fn open(&self, archive_path: &Path) -> Result<ArchiveHandle, BackendError> {
        let mut file =
            std::fs::File::open(archive_path).map_err(|e| BackendError::io(archive_path, e))?;

        let mut signature = [0u8; 6];
        let matches = match file.read_exact(&mut signature) {
            Ok(()) => signature == SEVEN_ZIP_SIGNATURE,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(BackendError::io(archive_path, e)),
        };

        if !matches {
            return Err(BackendError::Corrupted {
                archive: archive_path.to_path_buf(),
                reason: "missing 7z signature".to_string(),
            });
        }

        debug!(?archive_path, "opened 7z archive");
        Ok(ArchiveHandle::new(archive_path, false, 0))
    }

    fn extract_all(
        &self,
        handle: &ArchiveHandle,
        dest_path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<PathBuf>, BackendError> {
        let archive_path = handle.path();
        debug!(
            ?archive_path,
            password_length = password.map(str::len),
            ?dest_path,
            "attempting 7z extraction"
        );

        let with_password = password.is_some();
        let password = password
            .map(sevenz_rust::Password::from)
            .unwrap_or_else(sevenz_rust::Password::empty);

        let mut reader = sevenz_rust::SevenZReader::open(archive_path, password)
            .map_err(|e| Self::convert_sevenz_error(e, archive_path, with_password))?;

        let mut extracted_files = Vec::new();
        let mut failure = None;

        reader
            .for_each_entries(|entry, data| {
                match Self::write_entry(entry, data, dest_path, archive_path, with_password) {
                    Ok(Some(file_path)) => extracted_files.push(file_path),
                    Ok(None) => {}
                    Err(e) => {
                        failure = Some(e);
                        return Ok(false);
                    }
                }
                Ok(true)
            })
            .map_err(|e| Self::convert_sevenz_error(e, archive_path, with_password))?;

        if let Some(e) = failure {
            return Err(e);
        }

        extracted_files.sort();
        Ok(extracted_files)
    }
}
