//! Guide generation pipeline
//!
//! Snapshot → signals → technologies → commands → guide. The only fatal condition is
//! an unobtainable listing; everything downstream degrades instead of failing.

use crate::cache::{CacheKey, GuideCache};
use crate::commands::{CommandSynthesizer, TemplateTable};
use crate::config::GuideConfig;
use crate::error::GuideError;
use crate::guide::{GuideAssembler, SetupGuide};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::signals::{SignalExtractor, SignalSet};
use crate::snapshot::{RepositoryInfo, SnapshotProvider};
use crate::stack::{Classifier, RuleTable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct GuidePipeline {
    extractor: SignalExtractor,
    classifier: Classifier,
    synthesizer: CommandSynthesizer,
    assembler: GuideAssembler,
    list_timeout: Duration,
    progress: Arc<dyn ProgressHandler>,
    cache: Option<GuideCache>,
}

impl GuidePipeline {
    /// Pipeline with the built-in rule and template tables and no cache.
    pub fn new(config: &GuideConfig) -> Self {
        Self::with_tables(
            config,
            Arc::new(RuleTable::with_defaults()),
            Arc::new(TemplateTable::with_defaults()),
        )
    }

    pub fn with_tables(config: &GuideConfig, rules: Arc<RuleTable>, templates: Arc<TemplateTable>) -> Self {
        Self {
            extractor: SignalExtractor::new(config.extractor_config()),
            classifier: Classifier::new(rules.clone()),
            synthesizer: CommandSynthesizer::new(templates, rules, config.synthesizer_config()),
            assembler: GuideAssembler::new(),
            list_timeout: config.list_timeout(),
            progress: Arc::new(NoOpHandler),
            cache: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.extractor = self.extractor.with_progress(progress.clone());
        self.progress = progress;
        self
    }

    /// Caches guides of sources that report a revision.
    pub fn with_cache(mut self, cache: GuideCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub async fn run(&self, provider: &dyn SnapshotProvider) -> Result<SetupGuide, GuideError> {
        let start = Instant::now();
        let repository = provider.repository().clone();

        info!(repository = %repository.id, "Starting guide generation");
        self.progress.on_progress(&ProgressEvent::Started {
            repository: repository.id.clone(),
        });

        let result = self.generate(provider, &repository, start).await;

        if let Err(e) = &result {
            self.progress.on_progress(&ProgressEvent::Failed {
                error: e.to_string(),
            });
        }

        result
    }

    async fn generate(
        &self,
        provider: &dyn SnapshotProvider,
        repository: &RepositoryInfo,
        start: Instant,
    ) -> Result<SetupGuide, GuideError> {
        let cache_key = match &self.cache {
            Some(_) => provider.revision().await.map(|revision| {
                CacheKey::new(repository, &revision, self.synthesizer.config().fingerprint())
            }),
            None => None,
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(guide) = cache.get(key).await {
                self.progress.on_progress(&ProgressEvent::CacheHit {
                    repository: repository.id.clone(),
                    revision: key.revision.clone(),
                });
                return Ok(guide);
            }
        }

        let listing_start = Instant::now();
        let files = match tokio::time::timeout(self.list_timeout, provider.list_files()).await {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => {
                return Err(GuideError::snapshot_unavailable(&repository.id, format!("{:#}", e)));
            }
            Err(_) => {
                return Err(GuideError::snapshot_unavailable(
                    &repository.id,
                    format!("listing timed out after {}s", self.list_timeout.as_secs()),
                ));
            }
        };
        self.progress.on_progress(&ProgressEvent::ListingComplete {
            files: files.len(),
            elapsed: listing_start.elapsed(),
        });

        // An empty repository is a valid outcome, not an unavailable snapshot.
        let signals = if files.is_empty() {
            info!(repository = %repository.id, "Repository is empty");
            SignalSet::new()
        } else {
            self.extractor.extract(&files, provider).await?.signals
        };

        let classify_start = Instant::now();
        let technologies = self.classifier.classify(&signals);
        self.progress.on_progress(&ProgressEvent::Classified {
            technologies: technologies.len(),
            elapsed: classify_start.elapsed(),
        });

        let synthesis = self.synthesizer.synthesize(&technologies, &signals, repository);
        self.progress.on_progress(&ProgressEvent::CommandsSynthesized {
            steps: synthesis.steps.len(),
            notes: synthesis.notes.len(),
        });

        let guide = self
            .assembler
            .assemble(repository, technologies, synthesis, &signals)?;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            match cache.put(key, &guide).await {
                Ok(path) => debug!(path = %path.display(), "Stored guide in cache"),
                Err(e) => warn!(error = %e, "Failed to cache guide"),
            }
        }

        self.progress.on_progress(&ProgressEvent::Completed {
            technologies: guide.technologies.len(),
            steps: guide.steps.len(),
            total_time: start.elapsed(),
        });

        Ok(guide)
    }
}
