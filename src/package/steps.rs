//! Steps shared by every package variant.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{PackageContext, PackageVariant, Transition};
use crate::error::{PublishError, Result};
use crate::model::{MediaPackage, PublishStatus};
use crate::store::PackageUpdate;

/// Run a base transition for `variant`
pub async fn run(
    variant: &dyn PackageVariant,
    transition: Transition,
    context: &PackageContext,
    media: &mut MediaPackage,
) -> Result<()> {
    match transition {
        Transition::Init => init(context, media).await,
        Transition::CopyPackage => copy_package(context, media).await,
        Transition::RemoveOriginalPackage => remove_original_package(context, media).await,
        Transition::UploadMedia => upload_media(variant, context, media).await,
        Transition::ConfigureMedia => configure_media(context, media).await,
        Transition::CleanFile => clean_file(context, media).await,
        other => Err(PublishError::Config(format!(
            "{} is not handled by {} packages",
            other,
            variant.package_type().extension()
        ))),
    }
}

/// Create the package record, or refresh it when it already exists
pub async fn init(context: &PackageContext, media: &mut MediaPackage) -> Result<()> {
    if media.date.is_none() {
        media.date = Some(Utc::now());
    }
    media.status = PublishStatus::Pending;

    if context.store.get_one(&media.id).await?.is_some() {
        debug!("Package {} already recorded, refreshing", media.id);
        let mut update = PackageUpdate::default()
            .status(PublishStatus::Pending)
            .metadata(media.metadata.clone());
        if let Some(date) = media.date {
            update = update.date(date);
        }
        if let Some(package_type) = media.package_type {
            update = update.package_type(package_type);
        }
        context.store.update(&media.id, update).await
    } else {
        context.store.insert(vec![media.clone()]).await?;
        Ok(())
    }
}

/// Copy the dropped file into the working area
pub async fn copy_package(context: &PackageContext, media: &mut MediaPackage) -> Result<()> {
    let destination = context.working_copy_path(media);
    debug!(
        "Copying {} to {}",
        media.original_package_path.display(),
        destination.display()
    );
    context.fs.copy(&media.original_package_path, &destination).await
}

pub async fn remove_original_package(context: &PackageContext, media: &mut MediaPackage) -> Result<()> {
    let original = &media.original_package_path;
    if !context.fs.exists(original).await? {
        warn!("Original package {} is already gone", original.display());
        return Ok(());
    }
    context.fs.remove_file(original).await
}

/// Upload the media file and record the platform id
pub async fn upload_media(
    variant: &dyn PackageVariant,
    context: &PackageContext,
    media: &mut MediaPackage,
) -> Result<()> {
    let media_file = variant.media_file_path(context, media)?;
    let media_id = context.provider.upload(&media_file).await?;
    info!("Package {} uploaded as media {}", media.id, media_id);

    context
        .store
        .update(&media.id, PackageUpdate::default().media_id(media_id.clone()))
        .await?;
    media.media_id = Some(media_id);
    Ok(())
}

pub async fn configure_media(context: &PackageContext, media: &mut MediaPackage) -> Result<()> {
    let media_id = media
        .media_id
        .as_deref()
        .ok_or_else(|| PublishError::Platform(format!("package {} has no uploaded media", media.id)))?;
    context.provider.configure(media_id).await
}

/// Remove the working copy
pub async fn clean_file(context: &PackageContext, media: &mut MediaPackage) -> Result<()> {
    let working_copy = context.working_copy_path(media);
    if !context.fs.exists(&working_copy).await? {
        debug!("Working copy {} already removed", working_copy.display());
        return Ok(());
    }
    context.fs.remove_file(&working_copy).await
}
