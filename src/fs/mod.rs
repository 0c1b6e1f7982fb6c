// Filesystem collaborator
//
// The pipeline never touches the disk directly; every operation goes through
// the FileSystem trait so steps can be exercised against doubles:
// - LocalFileSystem: tokio::fs plus the system tar binary
// - ArchiveCommand: tar invocation builder

pub mod archive;
pub mod local;

use async_trait::async_trait;
use std::path::Path;

pub use archive::{ArchiveCommand, ArchiveCommandBuilder};
pub use local::LocalFileSystem;

use crate::error::Result;
use crate::model::PackageType;

const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";
const MP4_MAGIC_OFFSET: usize = 4;
const MP4_MAGIC: &[u8] = b"ftyp";

/// Bytes needed to recognize every supported package type
pub const FILE_TYPE_HEADER_LEN: usize = TAR_MAGIC_OFFSET + 8;

/// Filesystem operations used by the pipeline. Every failure carries the
/// offending path.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Extract an archive into `destination`, creating it if needed
    async fn extract(&self, archive: &Path, destination: &Path) -> Result<()>;

    /// Copy a file, creating the destination's parent directories
    async fn copy(&self, source: &Path, destination: &Path) -> Result<()>;

    /// Create a directory and its parents; an existing directory is not an error
    async fn mkdir(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it
    async fn rmdir(&self, path: &Path) -> Result<()>;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Names of the regular files directly inside `directory`
    async fn list_files(&self, directory: &Path) -> Result<Vec<String>>;

    async fn read_to_string(&self, path: &Path) -> Result<String>;

    async fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Detect the package type from the file's leading bytes
    async fn file_type(&self, path: &Path) -> Result<PackageType>;
}

/// Recognize a package type from a file header
pub fn detect_file_type(header: &[u8]) -> Option<PackageType> {
    let has_magic = |offset: usize, magic: &[u8]| {
        header
            .get(offset..offset + magic.len())
            .is_some_and(|bytes| bytes == magic)
    };

    if has_magic(TAR_MAGIC_OFFSET, TAR_MAGIC) {
        Some(PackageType::Tar)
    } else if has_magic(MP4_MAGIC_OFFSET, MP4_MAGIC) {
        Some(PackageType::Mp4)
    } else {
        None
    }
}
