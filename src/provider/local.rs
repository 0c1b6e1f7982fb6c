use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MediaInfo, MediaPlatformProvider, MediaSource, Quality};
use crate::config::LocalPlatformConfig;
use crate::error::{PublishError, Result};

const MANIFEST_FILE: &str = "media.json";

#[derive(Debug, Serialize, Deserialize)]
struct LocalManifest {
    file_name: String,
    quality: Quality,
}

/// Platform storing media in a local directory, one sub-directory per media
#[derive(Debug)]
pub struct LocalProvider {
    config: LocalPlatformConfig,
}

impl LocalProvider {
    pub fn new(config: Option<LocalPlatformConfig>) -> Result<Self> {
        let config = config.ok_or_else(|| {
            PublishError::Config("No configuration for the local media platform".to_string())
        })?;
        if config.directory.as_os_str().is_empty() {
            return Err(PublishError::Config(
                "Local media platform directory must not be empty".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn media_dir(&self, media_id: &str) -> Result<PathBuf> {
        if Uuid::parse_str(media_id).is_err() {
            return Err(PublishError::Platform(format!("invalid media id '{}'", media_id)));
        }
        Ok(self.config.directory.join(media_id))
    }
}

#[async_trait]
impl MediaPlatformProvider for LocalProvider {
    async fn upload(&self, media_file_path: &Path) -> Result<String> {
        let file_name = media_file_path
            .file_name()
            .ok_or_else(|| PublishError::Platform(format!("{} is not a file", media_file_path.display())))?
            .to_string_lossy()
            .to_string();
        let media_id = Uuid::new_v4().to_string();
        let media_dir = self.config.directory.join(&media_id);

        info!("Uploading {} to local platform as {}", media_file_path.display(), media_id);
        fs::create_dir_all(&media_dir)
            .await
            .map_err(|e| PublishError::io(&media_dir, e))?;
        fs::copy(media_file_path, media_dir.join(&file_name))
            .await
            .map_err(|e| PublishError::io(media_file_path, e))?;

        let manifest = LocalManifest {
            file_name,
            quality: self.config.quality,
        };
        let manifest_path = media_dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
            .await
            .map_err(|e| PublishError::io(&manifest_path, e))?;

        Ok(media_id)
    }

    async fn remove(&self, media_ids: &[String]) -> Result<()> {
        for media_id in media_ids {
            let media_dir = self.media_dir(media_id)?;
            match fs::remove_dir_all(&media_dir).await {
                Ok(()) => debug!("Removed local media {}", media_id),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Local media {} already removed", media_id)
                }
                Err(e) => return Err(PublishError::io(&media_dir, e)),
            }
        }
        Ok(())
    }

    async fn get_media_info(&self, media_id: &str, expected_quality: Quality) -> Result<MediaInfo> {
        let manifest_path = self.media_dir(media_id)?.join(MANIFEST_FILE);
        let content = fs::read_to_string(&manifest_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PublishError::NotFound(format!("media {}", media_id))
            } else {
                PublishError::io(&manifest_path, e)
            }
        })?;
        let manifest: LocalManifest = serde_json::from_str(&content)?;

        let link = self
            .config
            .directory
            .join(media_id)
            .join(&manifest.file_name)
            .to_string_lossy()
            .to_string();
        let source = MediaSource {
            quality: manifest.quality,
            link,
            width: None,
            height: None,
        };

        Ok(MediaInfo::from_sources(vec![source], expected_quality))
    }
}
