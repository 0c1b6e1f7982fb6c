// Media platform providers
//
// Every remote media backend implements MediaPlatformProvider; the pipeline
// only ever sees the trait object handed out by ProviderFactory:
// - Local: a directory acting as the media library
// - Rest: a generic REST media host reached through reqwest
//
// To add a platform:
// 1. Add its configuration section to PlatformsConfig
// 2. Implement MediaPlatformProvider, validating the configuration in `new`
// 3. Add a PlatformKind variant and wire it in ProviderFactory::create

pub mod local;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use local::LocalProvider;
pub use rest::RestProvider;

use crate::config::PlatformsConfig;
use crate::error::{PublishError, Result};

/// Stream quality, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    Mobile,
    Sd,
    Hd,
}

impl Quality {
    pub fn highest() -> Self {
        Quality::Hd
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "mobile" => Some(Quality::Mobile),
            "sd" => Some(Quality::Sd),
            "hd" => Some(Quality::Hd),
            _ => None,
        }
    }
}

/// One playable rendition of a media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    pub quality: Quality,
    pub link: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub sources: Vec<MediaSource>,
    /// Distinct qualities available, ascending
    pub qualities: Vec<Quality>,
    /// Whether a source of at least the expected quality exists
    pub available: bool,
}

impl MediaInfo {
    pub fn from_sources(sources: Vec<MediaSource>, expected: Quality) -> Self {
        let mut qualities: Vec<Quality> = sources.iter().map(|source| source.quality).collect();
        qualities.sort();
        qualities.dedup();
        let available = qualities.last().is_some_and(|best| *best >= expected);

        Self {
            sources,
            qualities,
            available,
        }
    }
}

/// Capabilities every media platform offers
#[async_trait]
pub trait MediaPlatformProvider: Send + Sync {
    /// Upload a media file, returning the platform's media id
    async fn upload(&self, media_file_path: &Path) -> Result<String>;

    /// Remove media from the platform
    async fn remove(&self, media_ids: &[String]) -> Result<()>;

    /// Apply platform properties to an uploaded media
    async fn configure(&self, _media_id: &str) -> Result<()> {
        Ok(())
    }

    /// Describe the available renditions of a media
    async fn get_media_info(&self, media_id: &str, expected_quality: Quality) -> Result<MediaInfo>;
}

/// Supported backend tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Local,
    Rest,
}

impl PlatformKind {
    pub fn from_token(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "local" => Ok(PlatformKind::Local),
            "rest" => Ok(PlatformKind::Rest),
            _ => Err(PublishError::Config(format!(
                "Unknown media platform '{}'. Valid platforms: local, rest",
                token
            ))),
        }
    }
}

/// Factory for media platform providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider for a backend token. Fails before any network
    /// access if the token is unknown or its configuration is absent.
    pub fn create(token: &str, config: &PlatformsConfig) -> Result<Box<dyn MediaPlatformProvider>> {
        match PlatformKind::from_token(token)? {
            PlatformKind::Local => Ok(Box::new(LocalProvider::new(config.local.clone())?)),
            PlatformKind::Rest => Ok(Box::new(RestProvider::new(config.rest.clone())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocalPlatformConfig, RestPlatformConfig};

    #[test]
    fn test_quality_ordering() {
        assert!(Quality::Mobile < Quality::Sd);
        assert!(Quality::Sd < Quality::Hd);
        assert_eq!(Quality::from_label("HD"), Some(Quality::Hd));
        assert_eq!(Quality::from_label("4k"), None);
    }

    #[test]
    fn test_media_info_availability() {
        let sources = vec![
            MediaSource { quality: Quality::Sd, link: "sd.mp4".into(), width: None, height: None },
            MediaSource { quality: Quality::Mobile, link: "m.mp4".into(), width: None, height: None },
        ];

        let info = MediaInfo::from_sources(sources.clone(), Quality::Sd);
        assert!(info.available);
        assert_eq!(info.qualities, vec![Quality::Mobile, Quality::Sd]);

        assert!(!MediaInfo::from_sources(sources, Quality::Hd).available);
        assert!(!MediaInfo::from_sources(Vec::new(), Quality::Mobile).available);
    }

    #[test]
    fn test_factory_rejects_unknown_token() {
        let err = ProviderFactory::create("vimeo", &PlatformsConfig::default()).err().unwrap();
        assert!(matches!(err, PublishError::Config(_)));
    }

    #[test]
    fn test_factory_requires_configuration() {
        let err = ProviderFactory::create("local", &PlatformsConfig::default()).err().unwrap();
        assert!(matches!(err, PublishError::Config(_)));
        let err = ProviderFactory::create("rest", &PlatformsConfig::default()).err().unwrap();
        assert!(matches!(err, PublishError::Config(_)));
    }

    #[test]
    fn test_factory_builds_configured_providers() {
        let config = PlatformsConfig {
            local: Some(LocalPlatformConfig {
                directory: "/srv/media".into(),
                quality: Quality::Sd,
            }),
            rest: Some(RestPlatformConfig {
                endpoint: "https://media.example.com/api".into(),
                token: "secret".into(),
                settings: None,
            }),
        };

        assert!(ProviderFactory::create("LOCAL", &config).is_ok());
        assert!(ProviderFactory::create("rest", &config).is_ok());
    }
}
