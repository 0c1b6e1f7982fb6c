use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::error::{PublishError, Result};

pub struct SetupManager {
    directories: Vec<PathBuf>,
}

impl SetupManager {
    pub fn new(config: &Config) -> Self {
        let mut directories = vec![
            config.work_dir.clone(),
            config.log_dir(),
            config.publish.tmp_dir.clone(),
            config.publish.public_dir.clone(),
            config.store.directory.clone(),
        ];
        if let Some(local) = &config.platforms.local {
            directories.push(local.directory.clone());
        }
        Self { directories }
    }

    /// Create the working directory structure
    pub async fn initialize(&self) -> Result<()> {
        for directory in &self.directories {
            fs::create_dir_all(directory)
                .await
                .map_err(|e| PublishError::io(directory, e))?;
        }
        info!("Working directories ready ({} checked)", self.directories.len());
        Ok(())
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}
