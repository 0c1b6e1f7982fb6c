use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{PackageFilter, PackageStore, PackageUpdate};
use crate::error::{PublishError, Result};
use crate::model::MediaPackage;

/// In-process package store
#[derive(Debug, Default)]
pub struct MemoryStore {
    packages: RwLock<HashMap<String, MediaPackage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn get(&self, filter: &PackageFilter) -> Result<Vec<MediaPackage>> {
        let packages = self.packages.read().await;
        let mut found: Vec<MediaPackage> = packages
            .values()
            .filter(|package| filter.matches(package))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn insert(&self, packages: Vec<MediaPackage>) -> Result<usize> {
        let mut stored = self.packages.write().await;
        let count = packages.len();
        for package in packages {
            stored.insert(package.id.clone(), package);
        }
        Ok(count)
    }

    async fn update(&self, id: &str, update: PackageUpdate) -> Result<()> {
        let mut stored = self.packages.write().await;
        let package = stored
            .get_mut(id)
            .ok_or_else(|| PublishError::NotFound(format!("package {}", id)))?;
        update.apply_to(package);
        Ok(())
    }

    async fn remove(&self, filter: &PackageFilter) -> Result<usize> {
        let mut stored = self.packages.write().await;
        let before = stored.len();
        stored.retain(|_, package| !filter.matches(package));
        Ok(before - stored.len())
    }
}
