//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { repository } => {
                info!(repository = %repository, "Generating setup guide");
            }
            ProgressEvent::CacheHit {
                repository,
                revision,
            } => {
                info!(repository = %repository, revision = %revision, "Using cached guide");
            }
            ProgressEvent::ListingComplete { files, elapsed } => {
                info!(
                    files,
                    elapsed_ms = elapsed.as_millis(),
                    "Repository listing complete"
                );
            }
            ProgressEvent::FileSkipped { path, reason } => {
                warn!(path = %path, reason = %reason, "Manifest skipped");
            }
            ProgressEvent::SignalsExtracted {
                signals,
                manifests_read,
                skipped,
                elapsed,
            } => {
                info!(
                    signals,
                    manifests_read,
                    skipped,
                    elapsed_ms = elapsed.as_millis(),
                    "Signal extraction complete"
                );
            }
            ProgressEvent::Classified {
                technologies,
                elapsed,
            } => {
                info!(
                    technologies,
                    elapsed_ms = elapsed.as_millis(),
                    "Classification complete"
                );
            }
            ProgressEvent::CommandsSynthesized { steps, notes } => {
                debug!(steps, notes, "Commands synthesized");
            }
            ProgressEvent::Completed {
                technologies,
                steps,
                total_time,
            } => {
                info!(
                    technologies,
                    steps,
                    total_time_ms = total_time.as_millis(),
                    "Setup guide complete"
                );
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Setup guide failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SkipReason;
    use std::time::Duration;

    #[test]
    fn test_logging_all_events() {
        let handler = LoggingHandler;

        let events = vec![
            ProgressEvent::Started {
                repository: "acme/demo".to_string(),
            },
            ProgressEvent::CacheHit {
                repository: "acme/demo".to_string(),
                revision: "abc123".to_string(),
            },
            ProgressEvent::ListingComplete {
                files: 10,
                elapsed: Duration::from_millis(5),
            },
            ProgressEvent::FileSkipped {
                path: "package.json".to_string(),
                reason: SkipReason::Malformed,
            },
            ProgressEvent::SignalsExtracted {
                signals: 8,
                manifests_read: 2,
                skipped: 1,
                elapsed: Duration::from_millis(12),
            },
            ProgressEvent::Classified {
                technologies: 3,
                elapsed: Duration::from_millis(1),
            },
            ProgressEvent::CommandsSynthesized { steps: 4, notes: 0 },
            ProgressEvent::Completed {
                technologies: 3,
                steps: 4,
                total_time: Duration::from_millis(20),
            },
            ProgressEvent::Failed {
                error: "listing failed".to_string(),
            },
        ];

        for event in events {
            handler.on_progress(&event);
        }
    }
}
