use crate::error::BackendError;
use crate::extraction::shared::{CopyError, copy_entry, entry_copy_error};
use crate::extraction::*;
use crate::types::{ArchiveType, ExtractionOutcome};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a password-encrypted ZIP using the deprecated ZipCrypto method
/// (only encryption method supported for writing by zip 0.6)
fn create_encrypted_zip(archive_path: &Path, file_name: &str, content: &[u8], password: &[u8]) {
    use ::zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .with_deprecated_encryption(password);
    writer.start_file(file_name, options).unwrap();
    std::io::Write::write_all(&mut writer, content).unwrap();
    writer.finish().unwrap();
}

/// Create a valid 7z archive from a source directory using sevenz_rust
fn create_7z_archive(archive_path: &Path, source_dir: &Path) {
    sevenz_rust::compress_to_path(source_dir, archive_path).unwrap();
}

/// Create a 7z archive whose content is AES encrypted with `password`
fn create_encrypted_7z_archive(archive_path: &Path, source_dir: &Path, password: &str) {
    sevenz_rust::compress_to_path_encrypted(source_dir, archive_path, password.into()).unwrap();
}

/// Relative path -> content for every file below `root`
fn tree_contents(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}

/// Scriptable backend that records every extraction attempt
struct MockBackend {
    /// Reported by `open` as encrypted
    encrypted: bool,
    /// Password that unlocks the archive (`None` = no password needed)
    correct: Option<&'static str>,
    /// Password that triggers a non-password failure
    corrupt_on: Option<&'static str>,
    attempts: Mutex<Vec<Option<String>>>,
}

impl MockBackend {
    fn new(encrypted: bool, correct: Option<&'static str>) -> Self {
        Self {
            encrypted,
            correct,
            corrupt_on: None,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<Option<String>> {
        self.attempts.lock().unwrap().clone()
    }
}

impl ArchiveBackend for MockBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
    }

    fn open(&self, archive: &Path) -> Result<ArchiveHandle, BackendError> {
        Ok(ArchiveHandle::new(archive, self.encrypted, 1))
    }

    fn extract_all(
        &self,
        handle: &ArchiveHandle,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<Vec<PathBuf>, BackendError> {
        self.attempts
            .lock()
            .unwrap()
            .push(password.map(str::to_string));

        if password.is_some() && password == self.corrupt_on {
            return Err(BackendError::Corrupted {
                archive: handle.path().to_path_buf(),
                reason: "bad block".into(),
            });
        }

        if password == self.correct {
            let file = dest.join("payload.bin");
            std::fs::write(&file, b"payload").unwrap();
            Ok(vec![file])
        } else {
            Err(BackendError::BadPassword {
                archive: handle.path().to_path_buf(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Password list
// ---------------------------------------------------------------------------

#[test]
fn test_password_list_new_deduplicates_in_order() {
    let list = PasswordList::new(["b", "a", "b", "", "c", "a"]);
    assert_eq!(list.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    assert_eq!(list.len(), 3);
}

#[test]
fn test_password_list_parse_list_trims() {
    let list = PasswordList::parse_list(" secret , hunter2,,other ,secret");
    assert_eq!(
        list.iter().collect::<Vec<_>>(),
        vec!["secret", "hunter2", "other"]
    );
}

#[test]
fn test_password_list_parse_list_empty() {
    assert!(PasswordList::parse_list("").is_empty());
    assert!(PasswordList::parse_list(" , ,").is_empty());
}

#[tokio::test]
async fn test_password_list_collect_empty() {
    let passwords = PasswordList::collect(&[], None).await;
    assert!(passwords.is_empty());
    assert_eq!(passwords.len(), 0);
}

#[tokio::test]
async fn test_password_list_file_appended_after_configured() {
    let temp_dir = TempDir::new().unwrap();
    let password_file = temp_dir.path().join("passwords.txt");
    std::fs::write(&password_file, "file1\nconfigured\n\nfile2\r\n").unwrap();

    let configured = vec!["configured".to_string(), "second".to_string()];
    let passwords = PasswordList::collect(&configured, Some(&password_file)).await;

    assert_eq!(
        passwords.iter().collect::<Vec<_>>(),
        vec!["configured", "second", "file1", "file2"]
    );
}

#[tokio::test]
async fn test_password_list_file_keeps_surrounding_whitespace() {
    let temp_dir = TempDir::new().unwrap();
    let password_file = temp_dir.path().join("passwords.txt");
    std::fs::write(&password_file, " lead\r\ntrail \r\n in side \nlast\r").unwrap();

    let passwords = PasswordList::collect(&[], Some(&password_file)).await;

    assert_eq!(
        passwords.iter().collect::<Vec<_>>(),
        vec![" lead", "trail ", " in side ", "last"]
    );
}

#[tokio::test]
async fn test_password_list_missing_file_is_ignored() {
    let configured = vec!["only".to_string()];
    let passwords =
        PasswordList::collect(&configured, Some(Path::new("/no/such/passwords.txt"))).await;
    assert_eq!(passwords.iter().collect::<Vec<_>>(), vec!["only"]);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn test_backend_for_extension_is_case_insensitive() {
    for (name, expected) in [
        ("a.zip", ArchiveType::Zip),
        ("a.ZIP", ArchiveType::Zip),
        ("a.rar", ArchiveType::Rar),
        ("a.Rar", ArchiveType::Rar),
        ("a.7z", ArchiveType::SevenZip),
        ("a.7Z", ArchiveType::SevenZip),
    ] {
        let backend = backend_for(Path::new(name)).unwrap();
        assert_eq!(backend.archive_type(), expected, "{name}");
    }
}

#[test]
fn test_unsupported_extensions() {
    for name in ["a.tar", "a.gz", "a.zip.part", "a", "a.r00", "a.txt"] {
        assert!(!is_supported(Path::new(name)), "{name}");
    }
}

#[test]
fn test_target_dir_uses_stem() {
    assert_eq!(
        target_dir(Path::new("/in/movie.zip"), Path::new("/out")),
        Some(PathBuf::from("/out/movie"))
    );
    assert_eq!(
        target_dir(Path::new("/in/show.s01.rar"), Path::new("/out")),
        Some(PathBuf::from("/out/show.s01"))
    );
}

#[tokio::test]
async fn test_extract_archive_unsupported_format() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("bundle.tar");
    std::fs::write(&archive_path, b"not handled").unwrap();

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert_eq!(outcome, ExtractionOutcome::UnsupportedFormat);
    assert!(
        std::fs::read_dir(output.path()).unwrap().next().is_none(),
        "nothing may be written for unsupported formats"
    );
}

// ---------------------------------------------------------------------------
// Password retry algorithm (mock backend)
// ---------------------------------------------------------------------------

#[test]
fn test_unencrypted_archive_needs_no_password() {
    let output = TempDir::new().unwrap();
    let backend = MockBackend::new(false, None);

    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/plain.zip"),
        output.path(),
        &PasswordList::new(["unused"]),
    );

    match outcome {
        ExtractionOutcome::Success {
            files,
            password_attempts,
        } => {
            assert_eq!(password_attempts, 0);
            assert_eq!(files, vec![output.path().join("plain/payload.bin")]);
        }
        other => panic!("expected Success, got {other:?}"),
    }
    assert_eq!(backend.attempts(), vec![None]);
}

#[test]
fn test_stops_at_first_working_password() {
    let output = TempDir::new().unwrap();
    let backend = MockBackend::new(true, Some("right"));

    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/locked.zip"),
        output.path(),
        &PasswordList::new(["wrong1", "right", "never-tried"]),
    );

    match outcome {
        ExtractionOutcome::Success {
            password_attempts, ..
        } => assert_eq!(password_attempts, 2),
        other => panic!("expected Success, got {other:?}"),
    }
    // encrypted on open: no bare attempt, and nothing after the match
    assert_eq!(
        backend.attempts(),
        vec![Some("wrong1".to_string()), Some("right".to_string())]
    );
}

#[test]
fn test_password_failure_without_password_moves_to_candidates() {
    let output = TempDir::new().unwrap();
    // encryption only discovered while extracting
    let backend = MockBackend::new(false, Some("pw"));

    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/late.7z"),
        output.path(),
        &PasswordList::new(["pw"]),
    );

    assert!(outcome.is_success(), "got {outcome:?}");
    assert_eq!(backend.attempts(), vec![None, Some("pw".to_string())]);
}

#[test]
fn test_password_exhausted_reports_attempt_count() {
    let output = TempDir::new().unwrap();
    let backend = MockBackend::new(true, Some("unknown"));

    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/locked.zip"),
        output.path(),
        &PasswordList::new(["a", "b", "c"]),
    );

    assert_eq!(outcome, ExtractionOutcome::PasswordExhausted { attempted: 3 });
    assert_eq!(backend.attempts().len(), 3);
    assert!(
        !output.path().join("locked").exists(),
        "failed extraction must not leave its output directory behind"
    );
}

#[test]
fn test_encrypted_with_empty_list() {
    let output = TempDir::new().unwrap();
    let backend = MockBackend::new(true, Some("secret"));

    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/locked.rar"),
        output.path(),
        &PasswordList::default(),
    );

    assert_eq!(outcome, ExtractionOutcome::PasswordExhausted { attempted: 0 });
    assert!(backend.attempts().is_empty());
}

#[test]
fn test_non_password_error_stops_candidates() {
    let output = TempDir::new().unwrap();
    let mut backend = MockBackend::new(true, Some("right"));
    backend.corrupt_on = Some("second");

    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/broken.rar"),
        output.path(),
        &PasswordList::new(["first", "second", "right"]),
    );

    assert!(
        matches!(outcome, ExtractionOutcome::Corrupted { .. }),
        "got {outcome:?}"
    );
    assert_eq!(backend.attempts().len(), 2, "no candidate after a corrupt read");
}

#[test]
fn test_existing_target_directory_is_kept_on_failure() {
    let output = TempDir::new().unwrap();
    let existing = output.path().join("locked");
    std::fs::create_dir_all(&existing).unwrap();
    std::fs::write(existing.join("keep.txt"), b"older run").unwrap();

    let backend = MockBackend::new(true, Some("unknown"));
    let outcome = extract_with_passwords(
        &backend,
        Path::new("/in/locked.zip"),
        output.path(),
        &PasswordList::new(["a"]),
    );

    assert!(!outcome.is_success());
    assert!(existing.join("keep.txt").exists());
}

// ---------------------------------------------------------------------------
// ZIP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_zip_extracts_into_stem_directory() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("holiday.zip");
    create_zip_archive(
        &archive_path,
        &[("readme.txt", b"hello"), ("photos/beach.jpg", b"\xff\xd8jpeg")],
    );

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    match outcome {
        ExtractionOutcome::Success {
            files,
            password_attempts,
        } => {
            assert_eq!(password_attempts, 0);
            assert_eq!(files.len(), 2);
        }
        other => panic!("expected Success, got {other:?}"),
    }

    let tree = tree_contents(&output.path().join("holiday"));
    assert_eq!(tree[Path::new("readme.txt")], b"hello");
    assert_eq!(tree[Path::new("photos/beach.jpg")], b"\xff\xd8jpeg");
    assert!(archive_path.exists(), "extraction alone never deletes the archive");
}

#[tokio::test]
async fn test_zip_extraction_is_idempotent() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("again.zip");
    create_zip_archive(&archive_path, &[("a.txt", b"one"), ("dir/b.txt", b"two")]);

    let first = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;
    let tree_after_first = tree_contents(output.path());
    let second = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;
    let tree_after_second = tree_contents(output.path());

    assert!(first.is_success());
    assert_eq!(first.kind(), second.kind());
    assert_eq!(tree_after_first, tree_after_second);
}

#[tokio::test]
async fn test_encrypted_zip_with_correct_password() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("secret.zip");
    create_encrypted_zip(&archive_path, "data.txt", b"classified", b"hunter2");

    let passwords = PasswordList::new(["wrong", "hunter2"]);
    let outcome = extract_archive(&archive_path, output.path(), &passwords).await;

    match outcome {
        ExtractionOutcome::Success {
            password_attempts, ..
        } => assert_eq!(password_attempts, 2),
        other => panic!("expected Success, got {other:?}"),
    }
    assert_eq!(
        std::fs::read(output.path().join("secret/data.txt")).unwrap(),
        b"classified"
    );
}

#[tokio::test]
async fn test_encrypted_zip_without_matching_password() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("secret.zip");
    create_encrypted_zip(&archive_path, "data.txt", b"classified", b"hunter2");

    let passwords = PasswordList::new(["nope", "still-nope"]);
    let outcome = extract_archive(&archive_path, output.path(), &passwords).await;

    assert_eq!(outcome, ExtractionOutcome::PasswordExhausted { attempted: 2 });
    assert!(!output.path().join("secret").exists());
}

#[tokio::test]
async fn test_encrypted_zip_with_no_passwords() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("secret.zip");
    create_encrypted_zip(&archive_path, "data.txt", b"classified", b"hunter2");

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert_eq!(outcome, ExtractionOutcome::PasswordExhausted { attempted: 0 });
}

#[tokio::test]
async fn test_corrupt_zip() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("broken.zip");
    std::fs::write(&archive_path, b"this is definitely not a zip file").unwrap();

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::new(["x"])).await;

    assert!(
        matches!(outcome, ExtractionOutcome::Corrupted { .. }),
        "got {outcome:?}"
    );
    assert!(!output.path().join("broken").exists());
}

#[tokio::test]
async fn test_zip_entry_escaping_destination_is_skipped() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("sneaky.zip");
    create_zip_archive(
        &archive_path,
        &[("../escaped.txt", b"evil"), ("fine.txt", b"good")],
    );

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert!(outcome.is_success(), "got {outcome:?}");
    assert!(!output.path().join("escaped.txt").exists());
    assert!(output.path().join("sneaky/fine.txt").exists());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_zip_write_failure_with_correct_password_is_io_error() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("secret.zip");
    create_encrypted_zip(&archive_path, "a.txt", &vec![b'x'; 100 * 1024], b"right");

    // the output file exists already and every write to it fails with ENOSPC
    let dest = output.path().join("secret");
    std::fs::create_dir_all(&dest).unwrap();
    std::os::unix::fs::symlink("/dev/full", dest.join("a.txt")).unwrap();

    let outcome =
        extract_archive(&archive_path, output.path(), &PasswordList::new(["right"])).await;

    assert!(
        matches!(outcome, ExtractionOutcome::IoError { .. }),
        "got {outcome:?}"
    );
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_zip_write_failure_without_password_is_io_error() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("plain.zip");
    create_zip_archive(&archive_path, &[("a.txt", b"some bytes")]);

    let dest = output.path().join("plain");
    std::fs::create_dir_all(&dest).unwrap();
    std::os::unix::fs::symlink("/dev/full", dest.join("a.txt")).unwrap();

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert!(
        matches!(outcome, ExtractionOutcome::IoError { .. }),
        "got {outcome:?}"
    );
}

// ---------------------------------------------------------------------------
// 7z
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_7z_extracts_into_stem_directory() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("notes.txt"), b"seven").unwrap();
    std::fs::create_dir_all(source.path().join("nested")).unwrap();
    std::fs::write(source.path().join("nested/deep.txt"), b"zip").unwrap();

    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("bundle.7z");
    create_7z_archive(&archive_path, source.path());

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert!(outcome.is_success(), "got {outcome:?}");
    let tree = tree_contents(&output.path().join("bundle"));
    assert_eq!(tree.len(), 2, "got {:?}", tree.keys().collect::<Vec<_>>());
    let content_of = |suffix: &str| {
        tree.iter()
            .find(|(path, _)| path.ends_with(suffix))
            .map(|(_, content)| content.clone())
            .unwrap()
    };
    assert_eq!(content_of("notes.txt"), b"seven");
    assert_eq!(content_of("nested/deep.txt"), b"zip");
}

#[tokio::test]
async fn test_corrupt_7z() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("broken.7z");
    std::fs::write(&archive_path, b"garbage garbage garbage").unwrap();

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert!(
        matches!(outcome, ExtractionOutcome::Corrupted { .. }),
        "got {outcome:?}"
    );
}

fn encrypted_7z_fixture(input: &TempDir) -> PathBuf {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("plans.txt"), b"top secret plans").unwrap();
    let archive_path = input.path().join("vault.7z");
    create_encrypted_7z_archive(&archive_path, source.path(), "hunter2");
    archive_path
}

#[tokio::test]
async fn test_encrypted_7z_with_no_passwords() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = encrypted_7z_fixture(&input);

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    assert_eq!(outcome, ExtractionOutcome::PasswordExhausted { attempted: 0 });
    assert!(!output.path().join("vault").exists());
}

#[tokio::test]
async fn test_encrypted_7z_without_matching_password() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = encrypted_7z_fixture(&input);

    let passwords = PasswordList::new(["letmein", "password1", "qwerty"]);
    let outcome = extract_archive(&archive_path, output.path(), &passwords).await;

    assert_eq!(outcome, ExtractionOutcome::PasswordExhausted { attempted: 3 });
    assert!(!output.path().join("vault").exists());
}

#[tokio::test]
async fn test_encrypted_7z_with_correct_password() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = encrypted_7z_fixture(&input);

    let passwords = PasswordList::new(["letmein", "password1", "hunter2"]);
    let outcome = extract_archive(&archive_path, output.path(), &passwords).await;

    match outcome {
        ExtractionOutcome::Success {
            files,
            password_attempts,
        } => {
            assert_eq!(password_attempts, 3);
            assert_eq!(files.len(), 1);
        }
        other => panic!("expected Success, got {other:?}"),
    }
    let tree = tree_contents(&output.path().join("vault"));
    assert_eq!(
        tree.values().collect::<Vec<_>>(),
        vec![&b"top secret plans".to_vec()]
    );
}

#[tokio::test]
async fn test_7z_reports_only_its_own_files() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("notes.txt"), b"seven").unwrap();

    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("bundle.7z");
    create_7z_archive(&archive_path, source.path());

    let dest = output.path().join("bundle");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("unrelated.txt"), b"was here before").unwrap();

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::default()).await;

    match outcome {
        ExtractionOutcome::Success { files, .. } => {
            assert_eq!(files.len(), 1, "got {files:?}");
            assert!(files[0].ends_with("notes.txt"));
        }
        other => panic!("expected Success, got {other:?}"),
    }
    assert!(dest.join("unrelated.txt").exists());
}

// ---------------------------------------------------------------------------
// RAR
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_corrupt_rar_is_not_a_password_failure() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let archive_path = input.path().join("broken.rar");
    std::fs::write(&archive_path, b"Rar! but not really").unwrap();

    let outcome = extract_archive(&archive_path, output.path(), &PasswordList::new(["a"])).await;

    assert!(
        !matches!(
            outcome,
            ExtractionOutcome::Success { .. } | ExtractionOutcome::PasswordExhausted { .. }
        ),
        "got {outcome:?}"
    );
    assert!(!output.path().join("broken").exists());
}

// ---------------------------------------------------------------------------
// Entry copy
// ---------------------------------------------------------------------------

/// Writer that fails every write
struct BrokenWriter;

impl std::io::Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("disk on fire"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reader that fails like a decoder fed with garbage
struct GarbageReader;

impl std::io::Read for GarbageReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "corrupt deflate stream",
        ))
    }
}

#[test]
fn test_copy_entry_copies_everything() {
    let data = vec![7u8; 200 * 1024];
    let mut out = Vec::new();

    let copied = copy_entry(&mut data.as_slice(), &mut out).unwrap();

    assert_eq!(copied, data.len() as u64);
    assert_eq!(out, data);
}

#[test]
fn test_copy_entry_write_failure_stays_io_even_with_password() {
    let err = copy_entry(&mut &b"payload"[..], &mut BrokenWriter).unwrap_err();
    assert!(matches!(err, CopyError::Write(_)), "got {err:?}");

    let err = entry_copy_error(err, Path::new("/in/a.zip"), Path::new("/out/a/x"), true);
    assert!(matches!(err, BackendError::Io { .. }), "got {err:?}");
}

#[test]
fn test_copy_entry_read_failure_classification() {
    let archive = Path::new("/in/a.zip");
    let file = Path::new("/out/a/x");

    let err = copy_entry(&mut GarbageReader, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, CopyError::Read(_)), "got {err:?}");
    assert!(entry_copy_error(err, archive, file, true).is_password_error());

    let err = copy_entry(&mut GarbageReader, &mut Vec::new()).unwrap_err();
    assert!(matches!(
        entry_copy_error(err, archive, file, false),
        BackendError::Corrupted { .. }
    ));

    let err = CopyError::Read(std::io::Error::other("device gone"));
    assert!(matches!(
        entry_copy_error(err, archive, file, false),
        BackendError::Io { .. }
    ));
}
