//! Archive fixtures and watcher configuration for scenario tests

use auto_unpack::Config;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Config rooted in `temp_dir` with timings short enough for tests
///
/// Input is `<temp>/in`, output is `<temp>/out`.
pub fn fast_config(temp_dir: &TempDir) -> Config {
    let mut config = Config {
        input_dir: temp_dir.path().join("in"),
        output_dir: temp_dir.path().join("out"),
        ..Default::default()
    };
    config.readiness.grace_period = Duration::from_millis(20);
    config.parking.check_interval = Duration::from_millis(25);
    config.parking.max_residency = Duration::from_secs(60);
    config.shutdown_grace = Duration::from_secs(10);
    config
}

/// Write a plain ZIP archive with the given entries
pub fn write_zip(archive_path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a ZipCrypto-encrypted ZIP archive with a single entry
pub fn write_encrypted_zip(archive_path: &Path, name: &str, content: &[u8], password: &str) {
    use zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .with_deprecated_encryption(password.as_bytes());
    writer.start_file(name, options).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap();
}

/// Write a ZIP archive and cut it in half, losing the central directory
pub fn write_truncated_zip(archive_path: &Path) {
    write_zip(
        archive_path,
        &[("payload.bin", &[7u8; 4096]), ("more.bin", &[9u8; 4096])],
    );
    let bytes = std::fs::read(archive_path).unwrap();
    std::fs::write(archive_path, &bytes[..bytes.len() / 2]).unwrap();
}
