// Package publication pipeline
//
// A Package drives one MediaPackage through the linear state machine of its
// variant, one transition at a time, persisting the reached state after each
// step so processing can resume from the record alone:
// - state_machine: transition names and the chain they form
// - steps: steps shared by every variant
// - tar: archives with descriptor, media, slides and synchronization file
// - video: a bare mp4 file
// - factory: picks the variant and platform for a package

pub mod factory;
pub mod state_machine;
pub mod steps;
pub mod tar;
pub mod video;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

pub use factory::PackageFactory;
pub use state_machine::{StateMachine, Transition, TransitionEntry};
pub use tar::TarPackage;
pub use video::VideoPackage;

use crate::config::PublishConfig;
use crate::error::{ErrorCode, PublishError, Result};
use crate::fs::FileSystem;
use crate::model::{MediaPackage, PackageErrorRecord, PackageState, PackageType, PublishStatus};
use crate::provider::MediaPlatformProvider;
use crate::store::{PackageStore, PackageUpdate};

/// Collaborators handed to every step
pub struct PackageContext {
    pub config: Arc<PublishConfig>,
    pub store: Arc<dyn PackageStore>,
    pub fs: Arc<dyn FileSystem>,
    pub provider: Box<dyn MediaPlatformProvider>,
}

impl PackageContext {
    /// Working copy of the dropped file: `<tmp_dir>/<id>.<ext>`
    pub fn working_copy_path(&self, media: &MediaPackage) -> PathBuf {
        let extension = media
            .package_type
            .map(|package_type| package_type.extension())
            .unwrap_or("bin");
        self.config.tmp_dir.join(format!("{}.{}", media.id, extension))
    }

    /// Per-package extraction directory: `<tmp_dir>/<id>`
    pub fn extract_dir(&self, media: &MediaPackage) -> PathBuf {
        self.config.tmp_dir.join(&media.id)
    }

    /// Per-package public assets directory: `<public_dir>/<id>`
    pub fn public_dir(&self, media: &MediaPackage) -> PathBuf {
        self.config.public_dir.join(&media.id)
    }
}

/// Format-specific part of a pipeline
#[async_trait]
pub trait PackageVariant: Send + Sync {
    fn package_type(&self) -> PackageType;

    /// Transition names in execution order
    fn transitions(&self) -> &[Transition];

    fn state_machine(&self) -> &StateMachine;

    /// Path of the media file to upload
    fn media_file_path(&self, context: &PackageContext, media: &MediaPackage) -> Result<PathBuf>;

    /// Run one transition's work
    async fn execute(
        &self,
        transition: Transition,
        context: &PackageContext,
        media: &mut MediaPackage,
    ) -> Result<()>;
}

/// A media package bound to its pipeline variant and collaborators
pub struct Package {
    media: MediaPackage,
    variant: Box<dyn PackageVariant>,
    context: PackageContext,
}

impl Package {
    pub fn new(media: MediaPackage, variant: Box<dyn PackageVariant>, context: PackageContext) -> Self {
        Self {
            media,
            variant,
            context,
        }
    }

    pub fn media(&self) -> &MediaPackage {
        &self.media
    }

    pub fn id(&self) -> &str {
        &self.media.id
    }

    pub fn transitions(&self) -> &[Transition] {
        self.variant.transitions()
    }

    /// Run transitions until the terminal state is reached or a step fails
    pub async fn process(&mut self) -> Result<PackageState> {
        info!("Processing package {} from state {}", self.media.id, self.media.state);
        while self.transition().await? {}
        info!("Package {} reached terminal state {}", self.media.id, self.media.state);
        Ok(self.media.state)
    }

    /// Run the transition leaving the current state.
    ///
    /// Returns `Ok(false)` when the package already sits in the terminal
    /// state. A failed step is recorded through [`Package::set_error`] and
    /// its error returned; a package in the error state stays halted until
    /// [`Package::rearm`] is called.
    pub async fn transition(&mut self) -> Result<bool> {
        if let Some(halted) = self.halted_error() {
            return Err(halted);
        }

        let Some(entry) = self.variant.state_machine().next_from(self.media.state).copied() else {
            return Ok(false);
        };

        debug!("Package {}: running {}", self.media.id, entry.name);
        let outcome = match self.run_step(entry.name).await {
            Ok(()) => self.record_state(&entry).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(()) => {
                info!("Package {}: {} -> {}", self.media.id, entry.name, entry.to);
                Ok(true)
            }
            Err(error) => Err(self.set_error(entry.name.error_code(), error).await),
        }
    }

    /// Record a failure and halt the package.
    ///
    /// The record moves to the error state with the failure code and
    /// message; `last_state` keeps the resume point. Returns the error to
    /// surface to the caller, noting it when the error state could not be
    /// stored.
    pub async fn set_error(&mut self, code: ErrorCode, error: PublishError) -> PublishError {
        let (code, message) = match error {
            PublishError::Package { code, message, .. } => (code, message),
            other => (code, other.to_string()),
        };
        error!("Package {} failed ({}): {}", self.media.id, code, message);

        let record = PackageErrorRecord {
            code,
            message: message.clone(),
        };
        let now = Utc::now();
        self.media.state = PackageState::Error;
        self.media.status = PublishStatus::Error;
        self.media.error = Some(record.clone());
        self.media.last_transition_date = Some(now);

        let update = PackageUpdate::default()
            .state(PackageState::Error)
            .status(PublishStatus::Error)
            .error(Some(record))
            .last_transition_date(now);
        let message = match self.context.store.update(&self.media.id, update).await {
            Ok(()) => message,
            Err(e) => {
                error!("Failed to persist error state of package {}: {}", self.media.id, e);
                format!("{} (error state not persisted: {})", message, e)
            }
        };

        PublishError::Package {
            id: self.media.id.clone(),
            code,
            message,
        }
    }

    /// Re-arm a failed package so the next [`Package::process`] resumes
    /// from its last successfully reached state.
    pub async fn rearm(&mut self) -> Result<()> {
        if !self.media.is_failed() {
            return Ok(());
        }

        info!("Re-arming package {} at state {}", self.media.id, self.media.last_state);
        // The next step sets its own status when it starts
        let status = PublishStatus::Pending;
        self.context
            .store
            .update(
                &self.media.id,
                PackageUpdate::default()
                    .state(self.media.last_state)
                    .status(status)
                    .error(None),
            )
            .await?;

        self.media.state = self.media.last_state;
        self.media.status = status;
        self.media.error = None;
        Ok(())
    }

    fn halted_error(&self) -> Option<PublishError> {
        if !self.media.is_failed() {
            return None;
        }
        let (code, message) = match &self.media.error {
            Some(record) => (record.code, format!("halted after error: {}", record.message)),
            None => (ErrorCode::Init, "halted in error state".to_string()),
        };
        Some(PublishError::Package {
            id: self.media.id.clone(),
            code,
            message,
        })
    }

    async fn run_step(&mut self, transition: Transition) -> Result<()> {
        if let Some(status) = transition.status() {
            self.context
                .store
                .update(&self.media.id, PackageUpdate::default().status(status))
                .await?;
            self.media.status = status;
        }
        self.variant
            .execute(transition, &self.context, &mut self.media)
            .await
    }

    async fn record_state(&mut self, entry: &TransitionEntry) -> Result<()> {
        let now = Utc::now();
        let mut update = PackageUpdate::default()
            .state(entry.to)
            .last_state(entry.to)
            .last_transition(entry.name.name())
            .last_transition_date(now);
        let terminal = self.variant.state_machine().next_from(entry.to).is_none();
        if terminal {
            update = update.status(PublishStatus::Published);
        }
        self.context.store.update(&self.media.id, update).await?;

        self.media.state = entry.to;
        self.media.last_state = entry.to;
        self.media.last_transition = Some(entry.name.name().to_string());
        self.media.last_transition_date = Some(now);
        if terminal {
            self.media.status = PublishStatus::Published;
        }
        Ok(())
    }
}
