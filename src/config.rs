use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PublishError, Result};
use crate::provider::Quality;

fn default_timecode_output_name() -> String {
    "synchro.json".to_string()
}

fn default_image_extensions() -> Vec<String> {
    ["jpeg", "jpg", "gif", "bmp"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_archive_binary() -> String {
    "tar".to_string()
}

fn default_log_file_name() -> String {
    "mediapub.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the working directory structure (logs live here)
    pub work_dir: PathBuf,
    pub publish: PublishConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Working area where packages are copied and extracted
    pub tmp_dir: PathBuf,
    /// Directory receiving one public sub-directory per package
    pub public_dir: PathBuf,
    /// Name of the package descriptor inside archives
    pub metadata_file_name: String,
    /// Name of the synchronization descriptor inside archives
    pub timecode_file_name: String,
    /// Name of the JSON timecode file written to the public directory
    #[serde(default = "default_timecode_output_name")]
    pub timecode_output_name: String,
    /// Accepted presentation image extensions (compared case-insensitively)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// Number of failed image copies tolerated before the copy step fails.
    /// Unset means image copies are best effort.
    #[serde(default)]
    pub max_image_copy_failures: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON record per package
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Path to the tar binary used for extraction
    #[serde(default = "default_archive_binary")]
    pub binary_path: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            binary_path: default_archive_binary(),
        }
    }
}

/// How often the log file is rolled over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file directory; `<work_dir>/log` when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_log_file_name(),
            rotation: LogRotation::default(),
            level: default_log_level(),
        }
    }
}

/// Per-backend configuration. A missing section means the backend is not
/// available; requesting it fails at package construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    pub local: Option<LocalPlatformConfig>,
    pub rest: Option<RestPlatformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalPlatformConfig {
    /// Directory acting as the remote media library
    pub directory: PathBuf,
    /// Quality reported for media stored on this platform
    #[serde(default = "Quality::highest")]
    pub quality: Quality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestPlatformConfig {
    /// Base URL of the media API
    pub endpoint: String,
    /// Bearer token
    pub token: String,
    /// Properties applied to each media after upload
    #[serde(default)]
    pub settings: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Default for Config {
    fn default() -> Self {
        let work_dir = PathBuf::from(".mediapub");
        Self {
            publish: PublishConfig {
                tmp_dir: work_dir.join("tmp"),
                public_dir: work_dir.join("public").join("videos"),
                metadata_file_name: ".session".to_string(),
                timecode_file_name: "synchro.xml".to_string(),
                timecode_output_name: default_timecode_output_name(),
                image_extensions: default_image_extensions(),
                max_image_copy_failures: None,
            },
            store: StoreConfig {
                directory: work_dir.join("store"),
            },
            archive: ArchiveConfig::default(),
            platforms: PlatformsConfig {
                local: Some(LocalPlatformConfig {
                    directory: work_dir.join("platform"),
                    quality: Quality::Hd,
                }),
                rest: None,
            },
            logging: LoggingConfig::default(),
            work_dir,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PublishError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PublishError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PublishError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| self.work_dir.join("log"))
    }
}
