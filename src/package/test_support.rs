use async_trait::async_trait;
use mockall::mock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use super::PackageContext;
use crate::config::{Config, PublishConfig};
use crate::error::{PublishError, Result};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::model::PackageType;
use crate::provider::{MediaInfo, MediaPlatformProvider, Quality};
use crate::store::MemoryStore;

mock! {
    pub Provider {}

    #[async_trait]
    impl MediaPlatformProvider for Provider {
        async fn upload(&self, media_file_path: &Path) -> Result<String>;
        async fn remove(&self, media_ids: &[String]) -> Result<()>;
        async fn configure(&self, media_id: &str) -> Result<()>;
        async fn get_media_info(&self, media_id: &str, expected_quality: Quality) -> Result<MediaInfo>;
    }
}

/// Provider accepting any number of uploads under a fixed id
pub fn uploading_provider(media_id: &'static str) -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_upload()
        .returning(move |_| Ok(media_id.to_string()));
    provider.expect_configure().returning(|_| Ok(()));
    provider
}

/// Local filesystem whose `extract` lays down a prepared directory instead
/// of running tar. Copies of files whose name contains `failing_copies`
/// fail.
pub struct StagedFileSystem {
    inner: LocalFileSystem,
    staged: PathBuf,
    failing_copies: Option<String>,
}

impl StagedFileSystem {
    pub fn new(staged: &Path) -> Self {
        Self {
            inner: LocalFileSystem::default(),
            staged: staged.to_path_buf(),
            failing_copies: None,
        }
    }

    pub fn failing_copies(mut self, pattern: &str) -> Self {
        self.failing_copies = Some(pattern.to_string());
        self
    }
}

#[async_trait]
impl FileSystem for StagedFileSystem {
    async fn extract(&self, _archive: &Path, destination: &Path) -> Result<()> {
        self.inner.mkdir(destination).await?;
        for name in self.inner.list_files(&self.staged).await? {
            self.inner
                .copy(&self.staged.join(&name), &destination.join(&name))
                .await?;
        }
        Ok(())
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<()> {
        let failing = self
            .failing_copies
            .as_deref()
            .is_some_and(|pattern| source.to_string_lossy().contains(pattern));
        if failing {
            return Err(PublishError::io(
                source,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "copy refused"),
            ));
        }
        self.inner.copy(source, destination).await
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        self.inner.mkdir(path).await
    }

    async fn rmdir(&self, path: &Path) -> Result<()> {
        self.inner.rmdir(path).await
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.inner.remove_file(path).await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn list_files(&self, directory: &Path) -> Result<Vec<String>> {
        self.inner.list_files(directory).await
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.inner.read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        self.inner.write(path, contents).await
    }

    async fn file_type(&self, path: &Path) -> Result<PackageType> {
        self.inner.file_type(path).await
    }
}

/// Temporary working area with a drop folder and a staged archive content
pub struct Fixture {
    pub root: TempDir,
    pub config: Arc<PublishConfig>,
    pub store: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default().publish;
        config.tmp_dir = root.path().join("tmp");
        config.public_dir = root.path().join("public");
        for dir in ["tmp", "public", "staged", "drop"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }

        Self {
            root,
            config: Arc::new(config),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut PublishConfig)) -> Self {
        let mut config = (*self.config).clone();
        edit(&mut config);
        self.config = Arc::new(config);
        self
    }

    pub fn staged_dir(&self) -> PathBuf {
        self.root.path().join("staged")
    }

    pub fn public_dir(&self, id: &str) -> PathBuf {
        self.config.public_dir.join(id)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.config.tmp_dir.clone()
    }

    /// Put a file into the content the next extraction lays down
    pub fn stage(&self, name: &str, contents: &str) {
        std::fs::write(self.staged_dir().join(name), contents).unwrap();
    }

    /// Stage a complete rich-media package: descriptor, media, two slides
    /// and their synchronization file
    pub fn stage_rich_media(&self) {
        self.stage(
            ".session",
            r#"{"filename":"video.mp4","rich-media":true,"date":1425916390}"#,
        );
        self.stage("video.mp4", "frames");
        self.stage("slide_0.jpg", "slide 0");
        self.stage("slide_1.jpg", "slide 1");
        self.stage(
            "synchro.xml",
            r#"<player><synchro id="slide_0.jpg" timecode="0"/><synchro id="slide_1.jpg" timecode="1200"/></player>"#,
        );
    }

    /// Drop a file carrying a tar header into the drop folder
    pub fn drop_tar(&self, name: &str) -> PathBuf {
        let mut header = vec![0u8; 512];
        header[257..262].copy_from_slice(b"ustar");
        self.drop_file(name, &header)
    }

    /// Drop a file carrying an mp4 header into the drop folder
    pub fn drop_mp4(&self, name: &str) -> PathBuf {
        let mut header = vec![0u8, 0, 0, 0x18];
        header.extend_from_slice(b"ftypmp42");
        header.extend_from_slice(&[0u8; 32]);
        self.drop_file(name, &header)
    }

    fn drop_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.path().join("drop").join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn context(&self, provider: MockProvider) -> PackageContext {
        self.context_with_fs(provider, Arc::new(StagedFileSystem::new(&self.staged_dir())))
    }

    pub fn context_with_fs(&self, provider: MockProvider, fs: Arc<dyn FileSystem>) -> PackageContext {
        PackageContext {
            config: self.config.clone(),
            store: self.store.clone(),
            fs,
            provider: Box::new(provider),
        }
    }
}
