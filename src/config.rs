//! Configuration types for auto-unpack

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Readiness detection settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Suffixes appended to the full file name by transfer tools while a file is
    /// still being written (e.g. `movie.zip.part`)
    #[serde(default = "default_companion_suffixes")]
    pub companion_suffixes: Vec<String>,

    /// One-time wait before the first readiness check (default: 1 second)
    ///
    /// Gives producers that create their sidecar slightly after the main file a chance to
    /// do so. Milliseconds in config files.
    #[serde(default = "default_grace_period", with = "duration_ms_serde")]
    pub grace_period: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            companion_suffixes: default_companion_suffixes(),
            grace_period: default_grace_period(),
        }
    }
}

/// Parking queue settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParkingConfig {
    /// Interval between re-checks of parked files (default: 5 seconds, milliseconds in
    /// config files)
    #[serde(default = "default_check_interval", with = "duration_ms_serde")]
    pub check_interval: Duration,

    /// Maximum time a file may stay parked before it is dropped (default: 6 hours)
    #[serde(default = "default_max_residency", with = "duration_serde")]
    pub max_residency: Duration,

    /// Maximum number of parked files; the oldest is evicted when full (default: 1000)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Log a "still waiting" line for each parked file every N cycles (default: 12)
    #[serde(default = "default_progress_log_every")]
    pub progress_log_every: u64,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            max_residency: default_max_residency(),
            max_entries: default_max_entries(),
            progress_log_every: default_progress_log_every(),
        }
    }
}

/// Main configuration for the folder watcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory watched for new archives (default: "/downloads")
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving one sub-directory per extracted archive
    /// (default: "/download_files")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Password candidates for encrypted archives, tried in order
    #[serde(default)]
    pub passwords: Vec<String>,

    /// Path to a password file (one password per line), appended after `passwords`
    #[serde(default)]
    pub password_file: Option<PathBuf>,

    /// Readiness detection settings
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Parking queue settings
    #[serde(default)]
    pub parking: ParkingConfig,

    /// How long shutdown waits for in-flight extractions (default: 30 seconds)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            passwords: Vec::new(),
            password_file: None,
            readiness: ReadinessConfig::default(),
            parking: ParkingConfig::default(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::config("config", format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the watcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.parking.max_entries == 0 {
            return Err(Error::config(
                "parking.max_entries",
                "max_entries must be greater than zero",
            ));
        }
        if self.parking.check_interval.is_zero() {
            return Err(Error::config(
                "parking.check_interval",
                "check_interval must be greater than zero",
            ));
        }
        if self.input_dir == self.output_dir {
            return Err(Error::config(
                "output_dir",
                "output_dir must differ from input_dir",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_input_dir() -> PathBuf {
    PathBuf::from("/downloads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/download_files")
}

fn default_companion_suffixes() -> Vec<String> {
    vec![
        ".part".into(),
        ".partial".into(),
        ".crdownload".into(),
        ".download".into(),
        ".!qB".into(),
        ".!ut".into(),
        ".aria2".into(),
        ".tmp".into(),
    ]
}

fn default_grace_period() -> Duration {
    Duration::from_secs(1)
}

fn default_check_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_residency() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_max_entries() -> usize {
    1000
}

fn default_progress_log_every() -> u64 {
    12
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper
mod duration_serde {
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

// Millisecond Duration serialization helper for the short timing knobs
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
