use crate::error::BackendError;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::result::ZipError;

use super::shared::{copy_entry, entry_copy_error};
use super::{ArchiveBackend, ArchiveHandle};

/// Archive backend for ZIP files
///
/// Handles stored and deflated entries, traditional ZipCrypto and AES encryption.
pub struct ZipBackend;

impl ZipBackend {
    fn open_archive(archive_path: &Path) -> Result<zip::ZipArchive<std::fs::File>, BackendError> {
        let file =
            std::fs::File::open(archive_path).map_err(|e| BackendError::io(archive_path, e))?;

        zip::ZipArchive::new(file).map_err(|e| convert_zip_error(e, archive_path))
    }

    /// Open a ZIP entry by index, handling password decryption if needed
    fn open_zip_entry<'a>(
        archive: &'a mut zip::ZipArchive<std::fs::File>,
        index: usize,
        password: Option<&str>,
        archive_path: &Path,
    ) -> Result<zip::read::ZipFile<'a>, BackendError> {
        match password {
            None => archive
                .by_index(index)
                .map_err(|e| convert_zip_error(e, archive_path)),
            Some(password) => archive
                .by_index_decrypt(index, password.as_bytes())
                .map_err(|e| convert_zip_error(e, archive_path))?
                .map_err(|_| BackendError::BadPassword {
                    archive: archive_path.to_path_buf(),
                }),
        }
    }

    /// Extract a single ZIP entry to disk, creating directories as needed
    fn extract_zip_entry(
        mut file: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
        with_password: bool,
    ) -> Result<Option<PathBuf>, BackendError> {
        let file_path = match file.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(?archive_path, entry = file.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        if file.is_dir() {
            std::fs::create_dir_all(&file_path).map_err(|e| BackendError::io(&file_path, e))?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
        }

        let mut outfile =
            std::fs::File::create(&file_path).map_err(|e| BackendError::io(&file_path, e))?;

        copy_entry(&mut file, &mut outfile)
            .map_err(|e| entry_copy_error(e, archive_path, &file_path, with_password))?;

        Ok(Some(file_path))
    }
}

impl ArchiveBackend for ZipBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
    }

    fn open(&self, archive_path: &Path) -> Result<ArchiveHandle, BackendError> {
        let mut archive = Self::open_archive(archive_path)?;
        let entry_count = archive.len();

        let mut encrypted = false;
        for i in 0..entry_count {
            match archive.by_index(i) {
                Ok(_) => {}
                Err(ZipError::UnsupportedArchive(msg)) if msg == ZipError::PASSWORD_REQUIRED => {
                    encrypted = true;
                    break;
                }
                Err(e) => return Err(convert_zip_error(e, archive_path)),
            }
        }

        debug!(?archive_path, entry_count, encrypted, "opened ZIP archive");
        Ok(ArchiveHandle::new(archive_path, encrypted, entry_count))
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
            "attempting ZIP extraction"
        );

        let mut archive = Self::open_archive(archive_path)?;
        let mut extracted_files = Vec::new();

        for i in 0..archive.len() {
            let file = Self::open_zip_entry(&mut archive, i, password, archive_path)?;

            if let Some(file_path) =
                Self::extract_zip_entry(file, dest_path, archive_path, password.is_some())?
            {
                extracted_files.push(file_path);
            }
        }

        extracted_files.sort();
        Ok(extracted_files)
    }
}

fn convert_zip_error(error: ZipError, archive_path: &Path) -> BackendError {
    match error {
        ZipError::Io(e) => BackendError::io(archive_path, e),
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
            BackendError::BadPassword {
                archive: archive_path.to_path_buf(),
            }
        }
        ZipError::UnsupportedArchive(msg) => BackendError::Unsupported {
            archive: archive_path.to_path_buf(),
            reason: msg.to_string(),
        },
        other => BackendError::Corrupted {
            archive: archive_path.to_path_buf(),
            reason: format!("failed to read ZIP archive: {}", other),
        },
    }
}
