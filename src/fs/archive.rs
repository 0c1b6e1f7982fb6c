use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PublishError, Result};

/// Archive tool invocation
#[derive(Debug, Clone)]
pub struct ArchiveCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl ArchiveCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Read the archive at `path`
    pub fn file<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-f").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Change to `path` before extracting
    pub fn directory<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-C").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn extract(self) -> Self {
        self.arg("-x")
    }

    /// Run the command and return its standard output
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing archive command: {} {:?}", self.binary_path, self.args);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| PublishError::io(&self.binary_path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::io(
                &self.binary_path,
                std::io::Error::other(format!("{} failed: {}", self.description, stderr.trim())),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Builder for the archive operations the pipeline needs
#[derive(Debug, Clone)]
pub struct ArchiveCommandBuilder {
    binary_path: String,
}

impl ArchiveCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(&self, archive: P, destination: Q) -> ArchiveCommand {
        ArchiveCommand::new(&self.binary_path, "Archive extraction")
            .extract()
            .file(archive)
            .directory(destination)
    }
}
