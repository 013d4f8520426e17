use super::manifest::{self, Tokens};
use super::watchlist::{self, ManifestFormat};
use super::SignalSet;
use crate::error::GuideError;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::snapshot::{FileEntry, SnapshotProvider};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Manifests nested deeper than this are only read when they are the shallowest copy.
const MAX_MANIFEST_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub read_timeout: Duration,
    pub max_manifest_bytes: u64,
    pub max_concurrent_reads: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            max_manifest_bytes: 512 * 1024,
            max_concurrent_reads: 8,
        }
    }
}

/// Why a manifest contributed no tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    Oversized,
    Binary,
    Timeout,
    ReadFailed,
    Malformed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotFound => "not found",
            SkipReason::Oversized => "oversized",
            SkipReason::Binary => "binary content",
            SkipReason::Timeout => "read timed out",
            SkipReason::ReadFailed => "read failed",
            SkipReason::Malformed => "malformed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
    pub detail: Option<String>,
}

/// Output of a full extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub signals: SignalSet,
    pub manifests_read: usize,
    /// Skipped manifests, sorted by path.
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
struct ManifestJob {
    path: String,
    format: ManifestFormat,
    size: Option<u64>,
}

enum ReadOutcome {
    Parsed(Tokens),
    Skipped(SkipReason, Option<String>),
}

/// Turns a repository listing plus on-demand reads into a [`SignalSet`].
pub struct SignalExtractor {
    config: ExtractorConfig,
    progress: Arc<dyn ProgressHandler>,
}

impl SignalExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    /// Presence and extension signals derived from the listing alone.
    pub fn scan(&self, files: &[FileEntry]) -> SignalSet {
        let mut signals = SignalSet::new();

        for entry in files.iter().filter(|e| !watchlist::is_ignored(e)) {
            if let Some(key) = watchlist::watch_key(entry) {
                signals.observe_file(&key, &entry.path);
            }
            if !entry.is_directory {
                if let Some(ext) = entry.extension() {
                    signals.observe_extension(&ext);
                }
            }
        }

        signals
    }

    fn manifest_jobs(&self, files: &[FileEntry], signals: &SignalSet) -> Vec<ManifestJob> {
        let mut jobs = BTreeMap::new();

        for entry in files
            .iter()
            .filter(|e| !e.is_directory && !watchlist::is_ignored(e))
        {
            let Some(key) = watchlist::watch_key(entry) else {
                continue;
            };
            let Some(format) = ManifestFormat::for_key(&key) else {
                continue;
            };
            let shallowest = signals.file_path(&key) == Some(entry.path.as_str());
            if entry.depth() <= MAX_MANIFEST_DEPTH || shallowest {
                jobs.insert(
                    entry.path.clone(),
                    ManifestJob {
                        path: entry.path.clone(),
                        format,
                        size: entry.size,
                    },
                );
            }
        }

        jobs.into_values().collect()
    }

    async fn read_manifest(&self, reader: &dyn SnapshotProvider, job: &ManifestJob) -> ReadOutcome {
        let limit = self.config.max_manifest_bytes;
        if let Some(size) = job.size.filter(|s| *s > limit) {
            return ReadOutcome::Skipped(SkipReason::Oversized, Some(format!("{} bytes", size)));
        }

        let content =
            match tokio::time::timeout(self.config.read_timeout, reader.read_file(&job.path)).await
            {
                Err(_) => return ReadOutcome::Skipped(SkipReason::Timeout, None),
                Ok(Err(e)) => {
                    return ReadOutcome::Skipped(SkipReason::ReadFailed, Some(format!("{:#}", e)))
                }
                Ok(Ok(None)) => return ReadOutcome::Skipped(SkipReason::NotFound, None),
                Ok(Ok(Some(content))) => content,
            };

        if content.len() as u64 > limit {
            return ReadOutcome::Skipped(
                SkipReason::Oversized,
                Some(format!("{} bytes", content.len())),
            );
        }
        if content.contains('\0') {
            return ReadOutcome::Skipped(SkipReason::Binary, None);
        }

        match manifest::parse(job.format, &content) {
            Ok(tokens) => ReadOutcome::Parsed(tokens),
            Err(e) => ReadOutcome::Skipped(SkipReason::Malformed, Some(e.to_string())),
        }
    }

    /// Extracts presence, extension and manifest-token signals.
    ///
    /// Fails only when the listing is empty. Manifest reads run concurrently but their
    /// results are merged in path order, so the output does not depend on completion
    /// order.
    pub async fn extract(
        &self,
        files: &[FileEntry],
        reader: &dyn SnapshotProvider,
    ) -> Result<Extraction, GuideError> {
        if files.is_empty() {
            return Err(GuideError::snapshot_unavailable(
                &reader.repository().id,
                "repository listing is empty",
            ));
        }

        let start = Instant::now();
        let mut signals = self.scan(files);
        let jobs = self.manifest_jobs(files, &signals);

        debug!(
            files = files.len(),
            manifests = jobs.len(),
            "Reading manifests"
        );

        let mut outcomes: Vec<(&str, ReadOutcome)> = stream::iter(jobs.iter())
            .map(|job| async move { (job.path.as_str(), self.read_manifest(reader, job).await) })
            .buffer_unordered(self.config.max_concurrent_reads.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.0.cmp(b.0));

        let mut manifests_read = 0;
        let mut skipped = Vec::new();

        for (path, outcome) in outcomes {
            match outcome {
                ReadOutcome::Parsed(tokens) => {
                    manifests_read += 1;
                    debug!(path = %path, tokens = tokens.len(), "Parsed manifest");
                    for token in &tokens {
                        signals.observe_token(token, path);
                    }
                }
                ReadOutcome::Skipped(reason, detail) => {
                    debug!(path = %path, reason = %reason, detail = ?detail, "Manifest skipped");
                    self.progress.on_progress(&ProgressEvent::FileSkipped {
                        path: path.to_string(),
                        reason,
                    });
                    skipped.push(SkippedFile {
                        path: path.to_string(),
                        reason,
                        detail,
                    });
                }
            }
        }

        self.progress.on_progress(&ProgressEvent::SignalsExtracted {
            signals: signals.len(),
            manifests_read,
            skipped: skipped.len(),
            elapsed: start.elapsed(),
        });

        Ok(Extraction {
            signals,
            manifests_read,
            skipped,
        })
    }
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalKind;
    use crate::snapshot::MemorySnapshot;

    async fn extract(snapshot: &MemorySnapshot, config: ExtractorConfig) -> Extraction {
        let files = snapshot.list_files().await.unwrap();
        SignalExtractor::new(config)
            .extract(&files, snapshot)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_extracts_all_signal_kinds() {
        let snapshot = MemorySnapshot::new("flask-app");
        snapshot.add_file("requirements.txt", "flask==2.3\n");
        snapshot.add_file("app.py", "from flask import Flask\n");
        snapshot.add_file("templates/index.html", "<html></html>");

        let extraction = extract(&snapshot, ExtractorConfig::default()).await;
        let signals = &extraction.signals;

        assert_eq!(signals.file_path("requirements.txt"), Some("requirements.txt"));
        assert_eq!(signals.file_path("app.py"), Some("app.py"));
        assert_eq!(signals.extension_count("py"), 1);
        assert_eq!(signals.extension_count("txt"), 1);
        assert!(signals.token("flask").is_some());
        assert_eq!(extraction.manifests_read, 1);
        assert!(extraction.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_is_unavailable() {
        let snapshot = MemorySnapshot::new("empty");
        let err = SignalExtractor::default()
            .extract(&[], &snapshot)
            .await
            .unwrap_err();
        assert!(matches!(err, GuideError::SnapshotUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_ignored_directories_produce_no_signals() {
        let snapshot = MemorySnapshot::new("node");
        snapshot.add_file("index.js", "");
        snapshot.add_file("node_modules/react/package.json", r#"{"dependencies":{"loose-envify":"1"}}"#);
        snapshot.add_file("node_modules/react/index.js", "");

        let extraction = extract(&snapshot, ExtractorConfig::default()).await;
        let signals = &extraction.signals;

        assert!(signals.file("package.json").is_none());
        assert!(signals.token("loose-envify").is_none());
        assert_eq!(signals.extension_count("js"), 1);
        assert_eq!(signals.file("index.js").unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_reads_are_skipped() {
        let snapshot = MemorySnapshot::new("broken");
        snapshot.add_file("package.json", "{ not json");
        snapshot.add_unreadable("requirements.txt", "permission denied");
        snapshot.add_file("Cargo.toml", "[dependencies]\nbinary = \"1\"\0");
        snapshot.add_file("go.mod", "module x\nrequire github.com/gin-gonic/gin v1.9.1\n");

        let extraction = extract(&snapshot, ExtractorConfig::default()).await;

        let reasons: Vec<(&str, SkipReason)> = extraction
            .skipped
            .iter()
            .map(|s| (s.path.as_str(), s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("Cargo.toml", SkipReason::Binary),
                ("package.json", SkipReason::Malformed),
                ("requirements.txt", SkipReason::ReadFailed),
            ]
        );
        assert!(extraction.signals.token("github.com/gin-gonic/gin").is_some());
        assert!(extraction.signals.file("package.json").is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_absent() {
        let snapshot = MemorySnapshot::new("slow");
        snapshot.add_slow_file("requirements.txt", "flask\n", Duration::from_secs(5));
        snapshot.add_file("app.py", "");

        let config = ExtractorConfig {
            read_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let extraction = extract(&snapshot, config).await;

        assert!(extraction.signals.token("flask").is_none());
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.skipped[0].reason, SkipReason::Timeout);
    }

    #[tokio::test]
    async fn test_oversized_manifest_is_not_read() {
        let snapshot = MemorySnapshot::new("big");
        snapshot.add_file("requirements.txt", &"flask\n".repeat(400));

        let config = ExtractorConfig {
            max_manifest_bytes: 1024,
            ..Default::default()
        };
        let extraction = extract(&snapshot, config).await;

        assert_eq!(extraction.skipped[0].reason, SkipReason::Oversized);
        assert!(extraction.signals.token("flask").is_none());
    }

    #[tokio::test]
    async fn test_nested_manifests_merge_tokens() {
        let snapshot = MemorySnapshot::new("mono");
        snapshot.add_file("frontend/package.json", r#"{"dependencies":{"react":"18"}}"#);
        snapshot.add_file("backend/requirements.txt", "django\n");
        snapshot.add_file("a/b/c/d/package.json", r#"{"dependencies":{"vue":"3"}}"#);

        let extraction = extract(&snapshot, ExtractorConfig::default()).await;
        let signals = &extraction.signals;

        assert_eq!(signals.token("react").unwrap().path(), Some("frontend/package.json"));
        assert!(signals.token("django").is_some());
        assert!(signals.token("vue").is_none());
        assert_eq!(signals.file("package.json").unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_signals() {
        let snapshot = MemorySnapshot::new("many");
        for i in 0..6 {
            snapshot.add_slow_file(
                &format!("svc{}/requirements.txt", i),
                &format!("pkg{}\nshared\n", i),
                Duration::from_millis(10 * (6 - i) as u64),
            );
        }

        let serial = extract(
            &snapshot,
            ExtractorConfig {
                max_concurrent_reads: 1,
                ..Default::default()
            },
        )
        .await;
        let parallel = extract(
            &snapshot,
            ExtractorConfig {
                max_concurrent_reads: 6,
                ..Default::default()
            },
        )
        .await;

        assert_eq!(serial.signals, parallel.signals);
        assert_eq!(
            parallel.signals.token("shared").unwrap().path(),
            Some("svc0/requirements.txt")
        );
        assert_eq!(
            parallel
                .signals
                .of_kind(SignalKind::ManifestToken)
                .count(),
            7
        );
    }
}
