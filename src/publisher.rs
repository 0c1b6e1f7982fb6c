use indicatif::ProgressBar;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{Config, PlatformsConfig};
use crate::error::{PublishError, Result};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::model::{MediaPackage, PackageState};
use crate::package::PackageFactory;
use crate::provider::{MediaInfo, ProviderFactory, Quality};
use crate::store::{JsonFileStore, PackageFilter, PackageStore};

/// Result of publishing one file of a batch
#[derive(Debug)]
pub struct PublishOutcome {
    pub path: PathBuf,
    pub id: String,
    pub result: Result<PackageState>,
}

pub struct Publisher {
    factory: PackageFactory,
    store: Arc<dyn PackageStore>,
    fs: Arc<dyn FileSystem>,
    platforms: PlatformsConfig,
    public_dir: PathBuf,
}

impl Publisher {
    /// Publisher backed by the configured JSON store and the local disk
    pub async fn new(config: &Config) -> Result<Self> {
        let store = JsonFileStore::open(&config.store.directory).await?;
        let fs = LocalFileSystem::new(&config.archive);
        Ok(Self::with_collaborators(config, Arc::new(store), Arc::new(fs)))
    }

    pub fn with_collaborators(config: &Config, store: Arc<dyn PackageStore>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            factory: PackageFactory::new(config, store.clone(), fs.clone()),
            store,
            fs,
            platforms: config.platforms.clone(),
            public_dir: config.publish.public_dir.clone(),
        }
    }

    /// Publish a single dropped file, returning the final record
    pub async fn publish_file<P: AsRef<Path>>(&self, path: P, platform: &str) -> Result<MediaPackage> {
        let path = path.as_ref();
        if !self.fs.exists(path).await? {
            return Err(PublishError::NotFound(path.display().to_string()));
        }

        let media = MediaPackage::new(Uuid::new_v4().to_string(), platform, path);
        info!("Publishing {} as package {}", path.display(), media.id);

        let mut package = self.factory.create(media).await?;
        package.process().await?;
        Ok(package.media().clone())
    }

    /// Publish every file found directly inside `directory`.
    ///
    /// Packages are processed concurrently; each outcome is reported
    /// separately.
    pub async fn publish_directory<P: AsRef<Path>>(
        &self,
        directory: P,
        platform: &str,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<PublishOutcome>> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(PublishError::Config(format!("{} is not a directory", directory.display())));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        info!("Found {} packages in {}", files.len(), directory.display());

        if let Some(progress) = progress {
            progress.set_length(files.len() as u64);
        }

        let runs = files.into_iter().map(|path| async move {
            let id = Uuid::new_v4().to_string();
            let media = MediaPackage::new(id.clone(), platform, &path);
            let result = match self.factory.create(media).await {
                Ok(mut package) => package.process().await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!("Failed to publish {}: {}", path.display(), e);
            }
            if let Some(progress) = progress {
                progress.inc(1);
            }
            PublishOutcome { path, id, result }
        });

        Ok(join_all(runs).await)
    }

    /// Re-arm a failed or interrupted package and resume it
    pub async fn retry(&self, id: &str) -> Result<MediaPackage> {
        let media = self.record(id).await?;
        info!("Retrying package {} from state {}", id, media.last_state);

        let mut package = self.factory.create(media).await?;
        package.rearm().await?;
        package.process().await?;
        Ok(package.media().clone())
    }

    /// One record, or every record when `id` is `None`
    pub async fn status(&self, id: Option<&str>) -> Result<Vec<MediaPackage>> {
        match id {
            Some(id) => Ok(vec![self.record(id).await?]),
            None => self.store.get(&PackageFilter::all()).await,
        }
    }

    pub async fn media_info(&self, id: &str, quality: Quality) -> Result<MediaInfo> {
        let media = self.record(id).await?;
        let media_id = media
            .media_id
            .ok_or_else(|| PublishError::NotFound(format!("uploaded media for package {}", id)))?;
        let provider = ProviderFactory::create(&media.platform, &self.platforms)?;
        provider.get_media_info(&media_id, quality).await
    }

    /// Remove the remote media, the public assets and the record
    pub async fn remove(&self, id: &str) -> Result<()> {
        let media = self.record(id).await?;
        if let Some(media_id) = &media.media_id {
            let provider = ProviderFactory::create(&media.platform, &self.platforms)?;
            provider.remove(std::slice::from_ref(media_id)).await?;
        }

        let public_dir = self.public_dir.join(&media.id);
        if self.fs.exists(&public_dir).await? {
            self.fs.rmdir(&public_dir).await?;
        }

        self.store.remove(&PackageFilter::by_id(id)).await?;
        info!("Removed package {}", id);
        Ok(())
    }

    async fn record(&self, id: &str) -> Result<MediaPackage> {
        self.store
            .get_one(id)
            .await?
            .ok_or_else(|| PublishError::NotFound(format!("package {}", id)))
    }
}
