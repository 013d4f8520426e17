use super::{FileEntry, RepositoryInfo, SnapshotProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const MAX_DEPTH: usize = 12;

/// Snapshot of a repository checked out on the local disk.
#[derive(Debug, Clone)]
pub struct LocalSnapshot {
    root: PathBuf,
    repository: RepositoryInfo,
}

impl LocalSnapshot {
    pub fn new(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Repository path does not exist: {:?}", path));
        }
        if !path.is_dir() {
            return Err(anyhow!("Repository path is not a directory: {:?}", path));
        }

        let root = path
            .canonicalize()
            .context("Failed to canonicalize repository path")?;

        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repository")
            .to_string();

        let clone_url = read_origin_url(&root).unwrap_or_else(|| root.display().to_string());

        debug!(root = %root.display(), clone_url = %clone_url, "LocalSnapshot initialized");

        Ok(Self {
            repository: RepositoryInfo::new(root.display().to_string(), name, clone_url),
            root,
        })
    }

    pub fn with_clone_url(mut self, clone_url: impl Into<String>) -> Self {
        self.repository.clone_url = clone_url.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();

        for result in WalkBuilder::new(&self.root)
            .max_depth(Some(MAX_DEPTH))
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|e| e.file_name() != OsStr::new(".git"))
            .build()
        {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if relative.as_os_str().is_empty() {
                continue;
            }

            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let file_type = entry.file_type();
            if file_type.map(|t| t.is_dir()).unwrap_or(false) {
                entries.push(FileEntry::directory(path));
            } else if file_type.map(|t| t.is_file()).unwrap_or(false) {
                let mut file = FileEntry::file(path);
                if let Ok(meta) = entry.metadata() {
                    file = file.with_size(meta.len());
                }
                entries.push(file);
            }
        }

        entries.sort();
        Ok(entries)
    }
}

#[async_trait]
impl SnapshotProvider for LocalSnapshot {
    fn repository(&self) -> &RepositoryInfo {
        &self.repository
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>> {
        let snapshot = self.clone();
        tokio::task::spawn_blocking(move || snapshot.walk())
            .await
            .context("Directory walk panicked")?
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        if Path::new(path)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(anyhow!("Path escapes repository root: {}", path));
        }
        let full_path = self.root.join(path);

        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read file {:?}", full_path)),
        }
    }
}

/// `url` of the `origin` remote from `.git/config`, if any.
fn read_origin_url(root: &Path) -> Option<String> {
    let config = std::fs::read_to_string(root.join(".git").join("config")).ok()?;
    let mut in_origin = false;

    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
            continue;
        }
        if in_origin {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return Some(value.trim().to_string());
                }
            }
        }
    }
    None
}
