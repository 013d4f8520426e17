//! Repository snapshot abstraction
//!
//! The detection engine never talks to a hosting API or the disk directly. It sees a
//! repository through [`SnapshotProvider`]: a flat listing of [`FileEntry`] values and
//! an on-demand, read-only text lookup. Providers own pagination, transport, and
//! credentials; the engine only owns timeouts around their calls.

mod github;
mod local;
mod memory;
mod source;

pub use github::GitHubSnapshot;
pub use local::LocalSnapshot;
pub use memory::MemorySnapshot;
pub use source::RepositorySource;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry of a repository listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    /// Repository-relative path, `/`-separated.
    pub path: String,
    pub is_directory: bool,
    /// Size in bytes when the provider knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            size: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Final path component.
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
    }

    /// Lower-cased extension of the final path component, if any.
    ///
    /// Dotfiles such as `.env` have no extension.
    pub fn extension(&self) -> Option<String> {
        let name = self.name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Parent directory components, outermost first.
    pub fn parent_components(&self) -> impl Iterator<Item = &str> {
        let trimmed = self.path.trim_end_matches('/');
        let parent = trimmed.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        parent.split('/').filter(|c| !c.is_empty())
    }

    /// Number of directories between the repository root and this entry.
    pub fn depth(&self) -> usize {
        self.parent_components().count()
    }
}

/// Identity of the repository being analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Stable identifier, e.g. `owner/repo` or an absolute path.
    pub id: String,
    /// Short name used for the checkout directory.
    pub name: String,
    pub clone_url: String,
}

impl RepositoryInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            clone_url: clone_url.into(),
        }
    }
}

/// Read-only view of a repository.
///
/// Both operations are idempotent. `read_file` returns `Ok(None)` when the file does not
/// exist; any other failure is an `Err` that callers may downgrade to absent evidence.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    fn repository(&self) -> &RepositoryInfo;

    /// Revision identifier (commit hash) when the source has one.
    async fn revision(&self) -> Option<String> {
        None
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>>;

    async fn read_file(&self, path: &str) -> Result<Option<String>>;
}
