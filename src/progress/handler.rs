//! Progress handler trait and events

use crate::signals::SkipReason;
use std::time::Duration;

/// Events emitted while a guide is generated
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Guide generation started
    Started { repository: String },

    /// Guide served from the cache
    CacheHit {
        repository: String,
        revision: String,
    },

    /// Repository listing obtained
    ListingComplete { files: usize, elapsed: Duration },

    /// A manifest could not contribute tokens
    FileSkipped { path: String, reason: SkipReason },

    /// Signal extraction finished
    SignalsExtracted {
        signals: usize,
        manifests_read: usize,
        skipped: usize,
        elapsed: Duration,
    },

    /// Technologies ranked
    Classified {
        technologies: usize,
        elapsed: Duration,
    },

    /// Command steps produced
    CommandsSynthesized { steps: usize, notes: usize },

    /// Guide assembled
    Completed {
        technologies: usize,
        steps: usize,
        total_time: Duration,
    },

    /// Guide generation failed
    Failed { error: String },
}

/// Trait for handling progress events during guide generation
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::Started {
            repository: "acme/demo".to_string(),
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::Started {
            repository: "acme/demo".to_string(),
        });
        handler.on_progress(&ProgressEvent::ListingComplete {
            files: 12,
            elapsed: Duration::from_millis(50),
        });
        handler.on_progress(&ProgressEvent::Completed {
            technologies: 3,
            steps: 4,
            total_time: Duration::from_millis(80),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::FileSkipped {
            path: "package.json".to_string(),
            reason: SkipReason::Timeout,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("FileSkipped"));
        assert!(debug_str.contains("Timeout"));
    }
}
