use super::{FileEntry, RepositoryInfo, SnapshotProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone)]
enum MemoryContent {
    Text(String),
    Directory,
    Unreadable(String),
    Slow(String, Duration),
}

/// In-memory snapshot for tests and embedders that already hold a listing.
pub struct MemorySnapshot {
    repository: RepositoryInfo,
    entries: RwLock<BTreeMap<String, MemoryContent>>,
    revision: Option<String>,
    unavailable: Option<String>,
}

impl MemorySnapshot {
    pub fn new(name: &str) -> Self {
        Self::with_repository(RepositoryInfo::new(
            format!("memory/{}", name),
            name,
            format!("https://example.com/{}.git", name),
        ))
    }

    pub fn with_repository(repository: RepositoryInfo) -> Self {
        Self {
            repository,
            entries: RwLock::new(BTreeMap::new()),
            revision: None,
            unavailable: None,
        }
    }

    /// A snapshot whose listing always fails.
    pub fn unavailable(name: &str, reason: &str) -> Self {
        let mut snapshot = Self::new(name);
        snapshot.unavailable = Some(reason.to_string());
        snapshot
    }

    pub fn with_revision(mut self, revision: &str) -> Self {
        self.revision = Some(revision.to_string());
        self
    }

    pub fn add_file(&self, path: &str, content: &str) {
        self.insert(path, MemoryContent::Text(content.to_string()));
    }

    pub fn add_dir(&self, path: &str) {
        self.insert(path, MemoryContent::Directory);
    }

    /// A listed file whose read fails with `reason`.
    pub fn add_unreadable(&self, path: &str, reason: &str) {
        self.insert(path, MemoryContent::Unreadable(reason.to_string()));
    }

    /// A listed file whose read completes only after `delay`.
    pub fn add_slow_file(&self, path: &str, content: &str, delay: Duration) {
        self.insert(path, MemoryContent::Slow(content.to_string(), delay));
    }

    fn insert(&self, path: &str, content: MemoryContent) {
        let path = path.trim_matches('/').to_string();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        let mut parent = String::new();
        let components: Vec<&str> = path.split('/').collect();
        for component in &components[..components.len().saturating_sub(1)] {
            if !parent.is_empty() {
                parent.push('/');
            }
            parent.push_str(component);
            entries
                .entry(parent.clone())
                .or_insert(MemoryContent::Directory);
        }

        entries.insert(path, content);
    }
}

#[async_trait]
impl SnapshotProvider for MemorySnapshot {
    fn repository(&self) -> &RepositoryInfo {
        &self.repository
    }

    async fn revision(&self) -> Option<String> {
        self.revision.clone()
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>> {
        if let Some(reason) = &self.unavailable {
            return Err(anyhow!("{}", reason));
        }

        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .map(|(path, content)| match content {
                MemoryContent::Directory => FileEntry::directory(path.clone()),
                MemoryContent::Text(text) | MemoryContent::Slow(text, _) => {
                    FileEntry::file(path.clone()).with_size(text.len() as u64)
                }
                MemoryContent::Unreadable(_) => FileEntry::file(path.clone()),
            })
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let content = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries.get(path.trim_matches('/')).cloned()
        };

        match content {
            None => Ok(None),
            Some(MemoryContent::Directory) => Err(anyhow!("Not a file: {}", path)),
            Some(MemoryContent::Text(text)) => Ok(Some(text)),
            Some(MemoryContent::Unreadable(reason)) => Err(anyhow!("{}", reason)),
            Some(MemoryContent::Slow(text, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_file_creates_parents() {
        let snapshot = MemorySnapshot::new("demo");
        snapshot.add_file("a/b/c.txt", "hello");

        let entries = snapshot.list_files().await.unwrap();
        let paths: Vec<(&str, bool)> = entries
            .iter()
            .map(|e| (e.path.as_str(), e.is_directory))
            .collect();

        assert_eq!(paths, vec![("a", true), ("a/b", true), ("a/b/c.txt", false)]);
        assert_eq!(entries[2].size, Some(5));
    }

    #[tokio::test]
    async fn test_read_file() {
        let snapshot = MemorySnapshot::new("demo");
        snapshot.add_file("README.md", "# demo");

        assert_eq!(
            snapshot.read_file("README.md").await.unwrap(),
            Some("# demo".to_string())
        );
        assert_eq!(snapshot.read_file("missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_file() {
        let snapshot = MemorySnapshot::new("demo");
        snapshot.add_unreadable("package.json", "permission denied");

        let err = snapshot.read_file("package.json").await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_unavailable_listing() {
        let snapshot = MemorySnapshot::unavailable("demo", "rate limited");
        assert!(snapshot.list_files().await.is_err());
    }

    #[tokio::test]
    async fn test_revision() {
        let snapshot = MemorySnapshot::new("demo").with_revision("abc123");
        assert_eq!(snapshot.revision().await, Some("abc123".to_string()));
        assert_eq!(snapshot.repository().name, "demo");
    }
}
