//! Package records as persisted by the store and mutated by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorCode;

/// Pipeline state of a package. Each variant's state machine uses a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageState {
    /// Not yet initialized; the start of every chain
    Pending,
    Initialized,
    PackageCopied,
    OriginalPackageRemoved,
    PackageExtracted,
    PackageValidated,
    PublicDirectoryPrepared,
    MediaUploaded,
    MediaConfigured,
    TimecodesSaved,
    CopiedImages,
    FileCleaned,
    DirectoryCleaned,
    /// Explicit error marker; no transition leaves it
    Error,
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PackageState::Pending => "pending",
            PackageState::Initialized => "initialized",
            PackageState::PackageCopied => "packageCopied",
            PackageState::OriginalPackageRemoved => "originalPackageRemoved",
            PackageState::PackageExtracted => "packageExtracted",
            PackageState::PackageValidated => "packageValidated",
            PackageState::PublicDirectoryPrepared => "publicDirectoryPrepared",
            PackageState::MediaUploaded => "mediaUploaded",
            PackageState::MediaConfigured => "mediaConfigured",
            PackageState::TimecodesSaved => "timecodesSaved",
            PackageState::CopiedImages => "copiedImages",
            PackageState::FileCleaned => "fileCleaned",
            PackageState::DirectoryCleaned => "directoryCleaned",
            PackageState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Human-facing activity shown to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublishStatus {
    Pending,
    Copying,
    Extracting,
    Validating,
    Preparing,
    Uploading,
    Configuring,
    SavingTimecodes,
    CopyingImages,
    Cleaning,
    Published,
    Error,
}

/// Input format of a package, detected from the dropped file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Tar,
    Mp4,
}

impl PackageType {
    pub fn extension(&self) -> &'static str {
        match self {
            PackageType::Tar => "tar",
            PackageType::Mp4 => "mp4",
        }
    }
}

/// Content of the package descriptor file.
///
/// ```json
/// { "date": 1425916390, "rich-media": true, "filename": "video.mp4", "duration": 30 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Name of the media file inside the package
    pub filename: Option<String>,
    /// Unix timestamp of the recording
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
    /// Whether the package carries synchronized presentation images
    #[serde(rename = "rich-media", default)]
    pub rich_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Descriptor fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageErrorRecord {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPackage {
    pub id: String,
    /// Backend token selecting the media platform
    pub platform: String,
    #[serde(default)]
    pub package_type: Option<PackageType>,
    pub original_package_path: PathBuf,
    #[serde(default)]
    pub original_file_name: Option<String>,
    pub state: PackageState,
    /// Last state reached successfully; resumption restarts from here
    pub last_state: PackageState,
    #[serde(default)]
    pub last_transition: Option<String>,
    pub status: PublishStatus,
    #[serde(default)]
    pub metadata: PackageMetadata,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Identifier assigned by the media platform after upload
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub error: Option<PackageErrorRecord>,
    #[serde(default)]
    pub last_transition_date: Option<DateTime<Utc>>,
}

impl MediaPackage {
    pub fn new<S1: Into<String>, S2: Into<String>, P: Into<PathBuf>>(
        id: S1,
        platform: S2,
        original_package_path: P,
    ) -> Self {
        let original_package_path = original_package_path.into();
        let original_file_name = original_package_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());

        Self {
            id: id.into(),
            platform: platform.into(),
            package_type: None,
            original_package_path,
            original_file_name,
            state: PackageState::Pending,
            last_state: PackageState::Pending,
            last_transition: None,
            status: PublishStatus::Pending,
            metadata: PackageMetadata::default(),
            date: None,
            media_id: None,
            error: None,
            last_transition_date: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == PackageState::Error
    }
}
