use async_trait::async_trait;
use chrono::DateTime;
use futures::future::join_all;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use super::{steps, PackageContext, PackageVariant, StateMachine, Transition, TransitionEntry};
use crate::config::PublishConfig;
use crate::error::{ErrorCode, PublishError, Result};
use crate::model::{MediaPackage, PackageMetadata, PackageState, PackageType};
use crate::store::PackageUpdate;
use crate::timecode;

/// Archive package: a tar holding a descriptor, the media file and,
/// for rich media, presentation images with their synchronization file.
///
/// ```text
/// initPackage -> copyPackage -> removeOriginalPackage -> extractPackage
///   -> validatePackage -> preparePublicDirectory -> uploadMedia
///   -> configureMedia -> saveTimecodes -> copyImages -> cleanFile
///   -> cleanDirectory
/// ```
pub struct TarPackage {
    state_machine: StateMachine,
    transitions: Vec<Transition>,
}

impl TarPackage {
    pub fn new(config: &PublishConfig) -> Result<Self> {
        if config.metadata_file_name.trim().is_empty() {
            return Err(PublishError::Config("metadata_file_name must not be empty".to_string()));
        }
        if config.timecode_file_name.trim().is_empty() {
            return Err(PublishError::Config("timecode_file_name must not be empty".to_string()));
        }

        let state_machine = StateMachine::base().extend(vec![
            TransitionEntry::new(
                Transition::ExtractPackage,
                PackageState::OriginalPackageRemoved,
                PackageState::PackageExtracted,
            ),
            TransitionEntry::new(
                Transition::ValidatePackage,
                PackageState::PackageExtracted,
                PackageState::PackageValidated,
            ),
            TransitionEntry::new(
                Transition::PreparePublicDirectory,
                PackageState::PackageValidated,
                PackageState::PublicDirectoryPrepared,
            ),
            TransitionEntry::new(
                Transition::UploadMedia,
                PackageState::PublicDirectoryPrepared,
                PackageState::MediaUploaded,
            ),
            TransitionEntry::new(
                Transition::SaveTimecodes,
                PackageState::MediaConfigured,
                PackageState::TimecodesSaved,
            ),
            TransitionEntry::new(
                Transition::CopyImages,
                PackageState::TimecodesSaved,
                PackageState::CopiedImages,
            ),
            TransitionEntry::new(Transition::CleanFile, PackageState::CopiedImages, PackageState::FileCleaned),
            TransitionEntry::new(
                Transition::CleanDirectory,
                PackageState::FileCleaned,
                PackageState::DirectoryCleaned,
            ),
        ])?;
        let transitions = state_machine.transition_names();

        Ok(Self {
            state_machine,
            transitions,
        })
    }

    async fn extract(&self, context: &PackageContext, media: &MediaPackage) -> Result<()> {
        let archive = context.working_copy_path(media);
        let destination = context.extract_dir(media);
        context.fs.extract(&archive, &destination).await
    }

    /// Read the descriptor and check the media file it names
    async fn validate(&self, context: &PackageContext, media: &mut MediaPackage) -> Result<()> {
        let directory = context.extract_dir(media);
        let descriptor_name = &context.config.metadata_file_name;
        let descriptor_path = directory.join(descriptor_name);

        if !context.fs.exists(&descriptor_path).await? {
            return Err(PublishError::Validation(format!("Missing metadata file {}", descriptor_name)));
        }
        let content = context.fs.read_to_string(&descriptor_path).await?;
        let metadata: PackageMetadata = serde_json::from_str(&content).map_err(|e| {
            PublishError::Validation(format!("Invalid metadata file {}: {}", descriptor_name, e))
        })?;

        let filename = metadata
            .filename
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| PublishError::Validation("No media file name found in metadata file".to_string()))?;
        if !is_plain_relative(Path::new(&filename)) {
            return Err(PublishError::Validation(format!(
                "Media file name {} points outside the package",
                filename
            )));
        }
        if !context.fs.exists(&directory.join(&filename)).await? {
            return Err(PublishError::Validation(format!("Missing file {}", filename)));
        }

        let date = metadata.date.and_then(|timestamp| DateTime::from_timestamp(timestamp, 0));
        let mut update = PackageUpdate::default().metadata(metadata.clone());
        if let Some(date) = date {
            update = update.date(date);
        }
        context.store.update(&media.id, update).await?;

        media.metadata = metadata;
        if date.is_some() {
            media.date = date;
        }
        Ok(())
    }

    async fn prepare_public_directory(&self, context: &PackageContext, media: &MediaPackage) -> Result<()> {
        context.fs.mkdir(&context.public_dir(media)).await
    }

    /// Transcode the synchronization file into the public directory.
    ///
    /// A missing file only matters for rich media; a file that does not
    /// transcode always fails the step.
    async fn save_timecodes(&self, context: &PackageContext, media: &MediaPackage) -> Result<()> {
        let source_name = &context.config.timecode_file_name;
        let source = context.extract_dir(media).join(source_name);

        if !context.fs.exists(&source).await? {
            if media.metadata.rich_media {
                return Err(PublishError::Timecode(format!(
                    "Missing synchronization file {} in rich media package",
                    source_name
                )));
            }
            info!("Package {} has no synchronization file", media.id);
            return Ok(());
        }

        let xml = context.fs.read_to_string(&source).await?;
        let timecodes = timecode::transcode(&xml)?;
        let destination = context.public_dir(media).join(&context.config.timecode_output_name);
        debug!("Saving {} timecodes to {}", timecodes.len(), destination.display());
        context.fs.write(&destination, &timecode::to_json(&timecodes)?).await
    }

    /// Copy every presentation image into the public directory.
    ///
    /// All copies are issued at once and the step settles only when each has
    /// finished. Failed copies are logged; they fail the step only past
    /// `max_image_copy_failures`.
    async fn copy_images(&self, context: &PackageContext, media: &MediaPackage) -> Result<()> {
        let source_dir = context.extract_dir(media);
        let files = context
            .fs
            .list_files(&source_dir)
            .await
            .map_err(|e| PublishError::Package {
                id: media.id.clone(),
                code: ErrorCode::ScanForImages,
                message: e.to_string(),
            })?;

        let images: Vec<String> = files
            .into_iter()
            .filter(|name| is_image(name, &context.config.image_extensions))
            .collect();
        if images.is_empty() {
            info!("Package {} has no images to copy", media.id);
            return Ok(());
        }

        let public_dir = context.public_dir(media);
        let copies = images.iter().map(|image| {
            let source = source_dir.join(image);
            let destination = public_dir.join(image);
            async move { context.fs.copy(&source, &destination).await }
        });
        let results = join_all(copies).await;

        let mut failures = 0usize;
        for (image, result) in images.iter().zip(results) {
            if let Err(e) = result {
                failures += 1;
                warn!("Package {}: failed to copy image {}: {}", media.id, image, e);
            }
        }
        info!(
            "Package {}: copied {} of {} images",
            media.id,
            images.len() - failures,
            images.len()
        );

        match context.config.max_image_copy_failures {
            Some(max) if failures > max => Err(PublishError::Package {
                id: media.id.clone(),
                code: ErrorCode::CopyImages,
                message: format!("{} of {} images failed to copy", failures, images.len()),
            }),
            _ => Ok(()),
        }
    }

    async fn clean_directory(&self, context: &PackageContext, media: &MediaPackage) -> Result<()> {
        let directory = context.extract_dir(media);
        if !context.fs.exists(&directory).await? {
            debug!("Extraction directory {} already removed", directory.display());
            return Ok(());
        }
        context.fs.rmdir(&directory).await
    }
}

#[async_trait]
impl PackageVariant for TarPackage {
    fn package_type(&self) -> PackageType {
        PackageType::Tar
    }

    fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    fn state_machine(&self) -> &StateMachine {
        &self.state_machine
    }

    fn media_file_path(&self, context: &PackageContext, media: &MediaPackage) -> Result<PathBuf> {
        let filename = media
            .metadata
            .filename
            .as_deref()
            .ok_or_else(|| PublishError::Validation("No media file name found in metadata file".to_string()))?;
        Ok(context.extract_dir(media).join(filename))
    }

    async fn execute(
        &self,
        transition: Transition,
        context: &PackageContext,
        media: &mut MediaPackage,
    ) -> Result<()> {
        match transition {
            Transition::ExtractPackage => self.extract(context, media).await,
            Transition::ValidatePackage => self.validate(context, media).await,
            Transition::PreparePublicDirectory => self.prepare_public_directory(context, media).await,
            Transition::SaveTimecodes => self.save_timecodes(context, media).await,
            Transition::CopyImages => self.copy_images(context, media).await,
            Transition::CleanDirectory => self.clean_directory(context, media).await,
            _ => steps::run(self, transition, context, media).await,
        }
    }
}

fn is_image(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extensions
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(extension))
        })
}

fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PublishStatus;
    use crate::package::Package;
    use crate::package::test_support::{uploading_provider, Fixture, MockProvider, StagedFileSystem};
    use crate::store::PackageStore;
    use std::sync::Arc;

    fn tar_package(fixture: &Fixture, id: &str) -> MediaPackage {
        let path = fixture.drop_tar(&format!("{}.tar", id));
        let mut media = MediaPackage::new(id, "local", path);
        media.package_type = Some(PackageType::Tar);
        media
    }

    fn package(fixture: &Fixture, media: MediaPackage, provider: MockProvider) -> Package {
        let variant = TarPackage::new(&fixture.config).unwrap();
        Package::new(media, Box::new(variant), fixture.context(provider))
    }

    #[test]
    fn test_chain_order() {
        let variant = TarPackage::new(&Fixture::new().config).unwrap();
        assert_eq!(
            variant.transitions(),
            &[
                Transition::Init,
                Transition::CopyPackage,
                Transition::RemoveOriginalPackage,
                Transition::ExtractPackage,
                Transition::ValidatePackage,
                Transition::PreparePublicDirectory,
                Transition::UploadMedia,
                Transition::ConfigureMedia,
                Transition::SaveTimecodes,
                Transition::CopyImages,
                Transition::CleanFile,
                Transition::CleanDirectory,
            ]
        );
        assert_eq!(variant.state_machine().terminal_state(), PackageState::DirectoryCleaned);
        assert_eq!(variant.transitions(), variant.state_machine().transition_names().as_slice());
    }

    #[test]
    fn test_rejects_empty_file_names() {
        let fixture = Fixture::new().with_config(|config| config.metadata_file_name = String::new());
        assert!(matches!(TarPackage::new(&fixture.config), Err(PublishError::Config(_))));

        let fixture = Fixture::new().with_config(|config| config.timecode_file_name = " ".to_string());
        assert!(matches!(TarPackage::new(&fixture.config), Err(PublishError::Config(_))));
    }

    #[test]
    fn test_image_extension_matching() {
        let extensions = vec!["jpg".to_string(), "gif".to_string()];
        assert!(is_image("slide.JPG", &extensions));
        assert!(is_image("anim.gif", &extensions));
        assert!(!is_image("video.mp4", &extensions));
        assert!(!is_image("jpg", &extensions));
    }

    #[tokio::test]
    async fn test_rich_media_package_is_published() {
        let fixture = Fixture::new();
        fixture.stage_rich_media();
        let media = tar_package(&fixture, "rich");
        let original = media.original_package_path.clone();

        let mut provider = MockProvider::new();
        provider
            .expect_upload()
            .withf(|path| path.ends_with("rich/video.mp4"))
            .times(1)
            .returning(|_| Ok("remote-1".to_string()));
        provider
            .expect_configure()
            .withf(|media_id| media_id.to_string() == "remote-1")
            .times(1)
            .returning(|_| Ok(()));

        let mut package = package(&fixture, media, provider);
        let state = package.process().await.unwrap();
        assert_eq!(state, PackageState::DirectoryCleaned);

        let public = fixture.public_dir("rich");
        assert_eq!(
            std::fs::read_to_string(public.join("synchro.json")).unwrap(),
            r#"[{"timecode":0,"image":"slide_0.jpg"},{"timecode":1200,"image":"slide_1.jpg"}]"#
        );
        assert!(public.join("slide_0.jpg").exists());
        assert!(public.join("slide_1.jpg").exists());
        assert!(!original.exists());
        assert!(!fixture.tmp_dir().join("rich").exists());
        assert!(!fixture.tmp_dir().join("rich.tar").exists());

        let record = fixture.store.get_one("rich").await.unwrap().unwrap();
        assert_eq!(record.state, PackageState::DirectoryCleaned);
        assert_eq!(record.status, PublishStatus::Published);
        assert_eq!(record.media_id.as_deref(), Some("remote-1"));
        assert_eq!(record.last_transition.as_deref(), Some("cleanDirectory"));
        assert!(record.metadata.rich_media);
        assert_eq!(record.date.map(|date| date.timestamp()), Some(1425916390));
    }

    #[tokio::test]
    async fn test_missing_filename_halts_before_upload() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"rich-media":false}"#);
        fixture.stage("video.mp4", "frames");

        let mut provider = MockProvider::new();
        provider.expect_upload().times(0);

        let mut package = package(&fixture, tar_package(&fixture, "nameless"), provider);
        let err = package.process().await.unwrap_err();
        assert!(matches!(
            &err,
            PublishError::Package { code: ErrorCode::Validation, message, .. }
                if message.contains("No media file name")
        ));

        let record = fixture.store.get_one("nameless").await.unwrap().unwrap();
        assert_eq!(record.state, PackageState::Error);
        assert_eq!(record.status, PublishStatus::Error);
        assert_eq!(record.last_state, PackageState::PackageExtracted);
        assert_eq!(record.error.map(|error| error.code), Some(ErrorCode::Validation));
        assert!(record.media_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_media_file_fails_validation() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4"}"#);

        let mut provider = MockProvider::new();
        provider.expect_upload().times(0);

        let mut package = package(&fixture, tar_package(&fixture, "empty"), provider);
        let err = package.process().await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Package { code: ErrorCode::Validation, message, .. } if message.contains("Missing file video.mp4")
        ));
    }

    #[tokio::test]
    async fn test_filename_outside_package_is_rejected() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"../../etc/passwd"}"#);

        let mut provider = MockProvider::new();
        provider.expect_upload().times(0);

        let mut package = package(&fixture, tar_package(&fixture, "escape"), provider);
        let err = package.process().await.unwrap_err();
        assert!(matches!(err, PublishError::Package { code: ErrorCode::Validation, .. }));
    }

    #[tokio::test]
    async fn test_missing_timecodes_tolerated_without_rich_media() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4","rich-media":false}"#);
        fixture.stage("video.mp4", "frames");

        let mut package = package(&fixture, tar_package(&fixture, "plain"), uploading_provider("remote-2"));
        assert_eq!(package.process().await.unwrap(), PackageState::DirectoryCleaned);
        assert!(!fixture.public_dir("plain").join("synchro.json").exists());
    }

    #[tokio::test]
    async fn test_missing_timecodes_fail_rich_media() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4","rich-media":true}"#);
        fixture.stage("video.mp4", "frames");

        let mut package = package(&fixture, tar_package(&fixture, "rich"), uploading_provider("remote-3"));
        let err = package.process().await.unwrap_err();
        assert!(matches!(err, PublishError::Package { code: ErrorCode::SaveTimecodes, .. }));

        let record = fixture.store.get_one("rich").await.unwrap().unwrap();
        assert_eq!(record.last_state, PackageState::MediaConfigured);
        assert_eq!(record.media_id.as_deref(), Some("remote-3"));
    }

    #[tokio::test]
    async fn test_unparsable_timecodes_always_fail() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4","rich-media":false}"#);
        fixture.stage("video.mp4", "frames");
        fixture.stage(
            "synchro.xml",
            r#"<player><synchro id="slide_0.jpg" timecode="soon"/></player>"#,
        );

        let mut package = package(&fixture, tar_package(&fixture, "broken"), uploading_provider("remote-4"));
        let err = package.process().await.unwrap_err();
        assert!(matches!(err, PublishError::Package { code: ErrorCode::SaveTimecodes, .. }));
    }

    #[tokio::test]
    async fn test_truncated_timecodes_fail_without_partial_output() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4","rich-media":false}"#);
        fixture.stage("video.mp4", "frames");
        fixture.stage(
            "synchro.xml",
            r#"<player><synchro id="slide_0.jpg" timecode="0"/><synchro><id>slide_1.jpg</id>"#,
        );

        let mut package = package(&fixture, tar_package(&fixture, "cut"), uploading_provider("remote-5"));
        let err = package.process().await.unwrap_err();
        assert!(matches!(err, PublishError::Package { code: ErrorCode::SaveTimecodes, .. }));
        assert!(!fixture.public_dir("cut").join("synchro.json").exists());

        let record = fixture.store.get_one("cut").await.unwrap().unwrap();
        assert_eq!(record.state, PackageState::Error);
        assert_eq!(record.last_state, PackageState::MediaConfigured);
    }

    #[tokio::test]
    async fn test_copies_only_accepted_images() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4"}"#);
        fixture.stage("video.mp4", "frames");
        fixture.stage("a.JPG", "a");
        fixture.stage("b.jpeg", "b");
        fixture.stage("c.bmp", "c");
        fixture.stage("notes.txt", "notes");

        let mut package = package(&fixture, tar_package(&fixture, "slides"), uploading_provider("remote-5"));
        package.process().await.unwrap();

        let mut copied: Vec<String> = std::fs::read_dir(fixture.public_dir("slides"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        copied.sort();
        assert_eq!(copied, vec!["a.JPG", "b.jpeg", "c.bmp"]);
    }

    #[tokio::test]
    async fn test_image_copy_failures_are_best_effort_by_default() {
        let fixture = Fixture::new();
        fixture.stage(".session", r#"{"filename":"video.mp4"}"#);
        fixture.stage("video.mp4", "frames");
        fixture.stage("good.jpg", "good");
        fixture.stage("broken.jpg", "broken");

        let fs = StagedFileSystem::new(&fixture.staged_dir()).failing_copies("broken.jpg");
        let context = fixture.context_with_fs(uploading_provider("remote-6"), Arc::new(fs));
        let variant = TarPackage::new(&fixture.config).unwrap();
        let mut package = Package::new(tar_package(&fixture, "partial"), Box::new(variant), context);

        assert_eq!(package.process().await.unwrap(), PackageState::DirectoryCleaned);
        assert!(fixture.public_dir("partial").join("good.jpg").exists());
        assert!(!fixture.public_dir("partial").join("broken.jpg").exists());
    }

    #[tokio::test]
    async fn test_image_copy_failure_threshold() {
        let fixture = Fixture::new().with_config(|config| config.max_image_copy_failures = Some(0));
        fixture.stage(".session", r#"{"filename":"video.mp4"}"#);
        fixture.stage("video.mp4", "frames");
        fixture.stage("good.jpg", "good");
        fixture.stage("broken.jpg", "broken");

        let fs = StagedFileSystem::new(&fixture.staged_dir()).failing_copies("broken.jpg");
        let context = fixture.context_with_fs(uploading_provider("remote-7"), Arc::new(fs));
        let variant = TarPackage::new(&fixture.config).unwrap();
        let mut package = Package::new(tar_package(&fixture, "strict"), Box::new(variant), context);

        let err = package.process().await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Package { code: ErrorCode::CopyImages, message, .. } if message.starts_with("1 of 2")
        ));
        assert!(fixture.public_dir("strict").join("good.jpg").exists());
    }

    #[tokio::test]
    async fn test_resumes_from_every_persisted_state() {
        let fixture = Fixture::new();
        fixture.stage_rich_media();
        let media = tar_package(&fixture, "resume");
        let mut visited = vec![media.state];

        // Restart from the stored record before every transition
        let mut current = media;
        loop {
            let mut package = package(&fixture, current, uploading_provider("remote-8"));
            if !package.transition().await.unwrap() {
                break;
            }
            current = fixture.store.get_one("resume").await.unwrap().unwrap();
            visited.push(current.state);
        }

        let variant = TarPackage::new(&fixture.config).unwrap();
        assert_eq!(visited, variant.state_machine().states());
        assert!(fixture.public_dir("resume").join("synchro.json").exists());
    }

    #[tokio::test]
    async fn test_rearm_resumes_after_failed_upload() {
        let fixture = Fixture::new();
        fixture.stage_rich_media();

        let mut failing = MockProvider::new();
        failing
            .expect_upload()
            .times(1)
            .returning(|_| Err(PublishError::Platform("quota exceeded".to_string())));
        let mut first = package(&fixture, tar_package(&fixture, "retry"), failing);

        let err = first.process().await.unwrap_err();
        assert!(matches!(err, PublishError::Package { code: ErrorCode::MediaUpload, .. }));
        assert!(matches!(
            first.transition().await,
            Err(PublishError::Package { code: ErrorCode::MediaUpload, .. })
        ));

        first.rearm().await.unwrap();
        let record = fixture.store.get_one("retry").await.unwrap().unwrap();
        assert_eq!(record.state, PackageState::PublicDirectoryPrepared);
        assert!(record.error.is_none());

        let mut resumed = package(&fixture, record, uploading_provider("remote-9"));
        assert_eq!(resumed.process().await.unwrap(), PackageState::DirectoryCleaned);
        assert_eq!(resumed.media().media_id.as_deref(), Some("remote-9"));
    }
}
