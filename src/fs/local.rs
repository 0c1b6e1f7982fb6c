use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{ArchiveCommandBuilder, FileSystem, FILE_TYPE_HEADER_LEN, detect_file_type};
use crate::config::ArchiveConfig;
use crate::error::{PublishError, Result};
use crate::model::PackageType;

/// Filesystem backed by the local disk
pub struct LocalFileSystem {
    archive: ArchiveCommandBuilder,
}

impl LocalFileSystem {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            archive: ArchiveCommandBuilder::new(&config.binary_path),
        }
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new(&ArchiveConfig::default())
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        debug!("Extracting {} to {}", archive.display(), destination.display());
        self.mkdir(destination).await?;
        self.archive.extract(archive, destination).execute().await?;
        Ok(())
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            self.mkdir(parent).await?;
        }
        fs::copy(source, destination)
            .await
            .map_err(|e| PublishError::io(source, e))?;
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn rmdir(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn list_files(&self, directory: &Path) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(directory)
            .await
            .map_err(|e| PublishError::io(directory, e))?;
        let mut files = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PublishError::io(directory, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PublishError::io(entry.path(), e))?;
            if file_type.is_file() {
                files.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        files.sort();
        Ok(files)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn file_type(&self, path: &Path) -> Result<PackageType> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| PublishError::io(path, e))?;
        let mut header = Vec::with_capacity(FILE_TYPE_HEADER_LEN);
        file.take(FILE_TYPE_HEADER_LEN as u64)
            .read_to_end(&mut header)
            .await
            .map_err(|e| PublishError::io(path, e))?;

        detect_file_type(&header).ok_or_else(|| {
            PublishError::UnsupportedFormat(format!("{} is neither a tar archive nor an mp4 file", path.display()))
        })
    }
}
