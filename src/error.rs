use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Package validation error: {0}")]
    Validation(String),

    #[error("Timecode error: {0}")]
    Timecode(String),

    #[error("Media platform error: {0}")]
    Platform(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Package {id} failed ({code}): {message}")]
    Package {
        id: String,
        code: ErrorCode,
        message: String,
    },
}

impl PublishError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        PublishError::Io {
            source,
            path: path.into(),
        }
    }

    /// Broad failure class used for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Config(_) | PublishError::Toml(_) => ErrorKind::Configuration,
            PublishError::Validation(_)
            | PublishError::Timecode(_)
            | PublishError::Xml(_)
            | PublishError::UnsupportedFormat(_) => ErrorKind::Validation,
            PublishError::Io { .. } | PublishError::NotFound(_) => ErrorKind::Io,
            PublishError::Http(_) | PublishError::Platform(_) => ErrorKind::Remote,
            PublishError::Store(_) | PublishError::Json(_) => ErrorKind::Storage,
            PublishError::Package { code, .. } => code.kind(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Io,
    Remote,
    Storage,
}

/// Identifies the pipeline step a package failed in. Persisted with the
/// package record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    Init,
    CopyPackage,
    RemoveOriginalPackage,
    Extract,
    Validation,
    CreatePublicDirectory,
    MediaUpload,
    MediaConfigure,
    SaveTimecodes,
    ScanForImages,
    CopyImages,
    CleanFile,
    CleanDirectory,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::Validation | ErrorCode::SaveTimecodes => ErrorKind::Validation,
            ErrorCode::MediaUpload | ErrorCode::MediaConfigure => ErrorKind::Remote,
            ErrorCode::Init => ErrorKind::Storage,
            _ => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::Init => "init",
            ErrorCode::CopyPackage => "copy-package",
            ErrorCode::RemoveOriginalPackage => "remove-original-package",
            ErrorCode::Extract => "extract",
            ErrorCode::Validation => "validation",
            ErrorCode::CreatePublicDirectory => "create-public-directory",
            ErrorCode::MediaUpload => "media-upload",
            ErrorCode::MediaConfigure => "media-configure",
            ErrorCode::SaveTimecodes => "save-timecodes",
            ErrorCode::ScanForImages => "scan-for-images",
            ErrorCode::CopyImages => "copy-images",
            ErrorCode::CleanFile => "clean-file",
            ErrorCode::CleanDirectory => "clean-directory",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
