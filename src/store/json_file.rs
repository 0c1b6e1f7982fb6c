use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{PackageFilter, PackageStore, PackageUpdate};
use crate::error::{PublishError, Result};
use crate::model::MediaPackage;

/// Stores each package as `<directory>/<id>.json`.
///
/// Writes go through a single lock so concurrent updates of the same record
/// never interleave their read-modify-write cycles.
pub struct JsonFileStore {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)
            .await
            .map_err(|e| PublishError::io(&directory, e))?;

        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(PublishError::Store(format!("invalid package id '{}'", id)));
        }
        Ok(self.directory.join(format!("{}.json", id)))
    }

    async fn record_exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| PublishError::io(path, e))
    }

    async fn read_record(&self, path: &Path) -> Result<MediaPackage> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_record(&self, package: &MediaPackage) -> Result<()> {
        let path = self.record_path(&package.id)?;
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(package)?;

        fs::write(&tmp_path, content)
            .await
            .map_err(|e| PublishError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| PublishError::io(&path, e))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MediaPackage>> {
        let mut packages = Vec::new();
        let mut entries = fs::read_dir(&self.directory)
            .await
            .map_err(|e| PublishError::io(&self.directory, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PublishError::io(&self.directory, e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match self.read_record(&path).await {
                Ok(package) => packages.push(package),
                Err(e) => warn!("Skipping unreadable package record {}: {}", path.display(), e),
            }
        }

        packages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(packages)
    }
}

#[async_trait]
impl PackageStore for JsonFileStore {
    async fn get(&self, filter: &PackageFilter) -> Result<Vec<MediaPackage>> {
        if let Some(ids) = &filter.ids {
            let mut found = Vec::new();
            for id in ids {
                let path = self.record_path(id)?;
                if !self.record_exists(&path).await? {
                    continue;
                }
                let package = self.read_record(&path).await?;
                if filter.matches(&package) {
                    found.push(package);
                }
            }
            return Ok(found);
        }

        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|package| filter.matches(package))
            .collect())
    }

    async fn insert(&self, packages: Vec<MediaPackage>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        for package in &packages {
            self.write_record(package).await?;
        }
        debug!("Inserted {} package record(s)", packages.len());
        Ok(packages.len())
    }

    async fn update(&self, id: &str, update: PackageUpdate) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.record_path(id)?;
        if !self.record_exists(&path).await? {
            return Err(PublishError::NotFound(format!("package {}", id)));
        }

        let mut package = self.read_record(&path).await?;
        update.apply_to(&mut package);
        self.write_record(&package).await
    }

    async fn remove(&self, filter: &PackageFilter) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let matching = self.get(filter).await?;
        for package in &matching {
            let path = self.record_path(&package.id)?;
            fs::remove_file(&path)
                .await
                .map_err(|e| PublishError::io(&path, e))?;
        }
        Ok(matching.len())
    }
}
