use std::sync::Arc;
use tracing::debug;

use super::{Package, PackageContext, PackageVariant, TarPackage, VideoPackage};
use crate::config::{Config, PlatformsConfig, PublishConfig};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::model::{MediaPackage, PackageType};
use crate::provider::{MediaPlatformProvider, ProviderFactory};
use crate::store::PackageStore;

/// Binds package records to their variant, platform and collaborators
pub struct PackageFactory {
    publish: Arc<PublishConfig>,
    platforms: PlatformsConfig,
    store: Arc<dyn PackageStore>,
    fs: Arc<dyn FileSystem>,
}

impl PackageFactory {
    pub fn new(config: &Config, store: Arc<dyn PackageStore>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            publish: Arc::new(config.publish.clone()),
            platforms: config.platforms.clone(),
            store,
            fs,
        }
    }

    pub fn store(&self) -> &Arc<dyn PackageStore> {
        &self.store
    }

    /// Build the pipeline for a package. Platform and variant configuration
    /// errors surface here, before any step runs.
    pub async fn create(&self, media: MediaPackage) -> Result<Package> {
        let provider = ProviderFactory::create(&media.platform, &self.platforms)?;
        self.create_with_provider(media, provider).await
    }

    pub async fn create_with_provider(
        &self,
        mut media: MediaPackage,
        provider: Box<dyn MediaPlatformProvider>,
    ) -> Result<Package> {
        let package_type = match media.package_type {
            Some(package_type) => package_type,
            None => {
                let detected = self.fs.file_type(&media.original_package_path).await?;
                debug!("Package {} detected as {}", media.id, detected.extension());
                media.package_type = Some(detected);
                detected
            }
        };

        let variant: Box<dyn PackageVariant> = match package_type {
            PackageType::Tar => Box::new(TarPackage::new(&self.publish)?),
            PackageType::Mp4 => Box::new(VideoPackage::new()),
        };
        let context = PackageContext {
            config: self.publish.clone(),
            store: self.store.clone(),
            fs: self.fs.clone(),
            provider,
        };

        Ok(Package::new(media, variant, context))
    }
}
