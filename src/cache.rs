//! On-disk guide cache keyed by repository, revision and generation settings
//!
//! Entries are JSON files named by the SHA-256 of the [`CacheKey`]. A guide is only
//! cached when the source reports a revision, so a cache hit always refers to the exact
//! same snapshot rendered with the same clone URL and settings. Unreadable or
//! mismatched entries are treated as misses.

use crate::guide::SetupGuide;
use crate::snapshot::RepositoryInfo;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything a cached guide depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub repository: String,
    pub revision: String,
    pub clone_url: String,
    /// Fingerprint of the settings that shape synthesis.
    pub settings: String,
}

impl CacheKey {
    pub fn new(repository: &RepositoryInfo, revision: &str, settings: impl Into<String>) -> Self {
        Self {
            repository: repository.id.clone(),
            revision: revision.to_string(),
            clone_url: repository.clone_url.clone(),
            settings: settings.into(),
        }
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.repository, &self.revision, &self.clone_url, &self.settings] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub key: CacheKey,
    pub cached_at: DateTime<Utc>,
    pub guide: SetupGuide,
}

#[derive(Debug, Clone)]
pub struct GuideCache {
    dir: PathBuf,
}

impl GuideCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    pub async fn get(&self, key: &CacheKey) -> Option<SetupGuide> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cache miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.key == *key => {
                debug!(path = %path.display(), cached_at = %entry.cached_at, "Cache hit");
                Some(entry.guide)
            }
            Ok(_) => {
                warn!(path = %path.display(), "Cache entry was written for another key, ignoring");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache entry, ignoring");
                None
            }
        }
    }

    pub async fn put(&self, key: &CacheKey, guide: &SetupGuide) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;

        let entry = CacheEntry {
            key: key.clone(),
            cached_at: Utc::now(),
            guide: guide.clone(),
        };
        let json = serde_json::to_string_pretty(&entry).context("Failed to serialize cache entry")?;

        let path = self.path_for(key);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write cache entry {}", path.display()))?;

        debug!(path = %path.display(), "Guide cached");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandStep, Phase};
    use tempfile::TempDir;

    fn guide() -> SetupGuide {
        SetupGuide {
            repository_name: "demo".to_string(),
            technologies: vec![],
            steps: vec![CommandStep {
                phase: Phase::Clone,
                order: 1,
                description: "Clone".to_string(),
                command: "git clone x".to_string(),
                technology: None,
            }],
            notes: vec!["note".to_string()],
        }
    }

    fn repository() -> RepositoryInfo {
        RepositoryInfo::new("acme/demo", "demo", "https://github.com/acme/demo.git")
    }

    fn key(revision: &str) -> CacheKey {
        CacheKey::new(&repository(), revision, "v1")
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = GuideCache::new(dir.path().join("nested"));

        assert!(cache.get(&key("abc123")).await.is_none());

        let path = cache.put(&key("abc123"), &guide()).await.unwrap();
        assert!(path.exists());
        assert_eq!(cache.get(&key("abc123")).await, Some(guide()));
        assert!(cache.get(&key("def456")).await.is_none());
    }

    #[test]
    fn test_path_is_hashed() {
        let cache = GuideCache::new("/tmp/c");
        let a = cache.path_for(&key("abc"));
        let b = cache.path_for(&key("abd"));
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".json".len());
        assert!(name.ends_with(".json"));
    }

    #[tokio::test]
    async fn test_clone_url_and_settings_are_part_of_the_key() {
        let dir = TempDir::new().unwrap();
        let cache = GuideCache::new(dir.path());
        cache.put(&key("abc"), &guide()).await.unwrap();

        let mirror = RepositoryInfo::new("acme/demo", "demo", "git@mirror.example:acme/demo.git");
        assert!(cache.get(&CacheKey::new(&mirror, "abc", "v1")).await.is_none());
        assert!(cache.get(&CacheKey::new(&repository(), "abc", "v2")).await.is_none());
        assert_ne!(
            cache.path_for(&key("abc")),
            cache.path_for(&CacheKey::new(&mirror, "abc", "v1"))
        );
    }

    #[tokio::test]
    async fn test_mismatched_entry_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = GuideCache::new(dir.path());
        let path = cache.put(&key("abc"), &guide()).await.unwrap();
        std::fs::rename(&path, cache.path_for(&key("other"))).unwrap();
        assert!(cache.get(&key("other")).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = GuideCache::new(dir.path());
        std::fs::write(cache.path_for(&key("abc")), "{not json").unwrap();
        assert!(cache.get(&key("abc")).await.is_none());
    }
}
