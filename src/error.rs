//! Error taxonomy for guide generation
//!
//! Only [`GuideError::SnapshotUnavailable`] is a user-facing failure. Unreadable
//! manifests, empty classifications and package-manager ambiguity are absorbed where
//! they occur and never become errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuideError {
    /// The repository listing could not be obtained at all
    #[error("Snapshot unavailable for {repository}: {reason}")]
    SnapshotUnavailable { repository: String, reason: String },

    /// An upstream component produced output that violates the guide invariants
    #[error("Malformed guide: {0}")]
    MalformedGuide(String),
}

impl GuideError {
    pub fn snapshot_unavailable(repository: impl Into<String>, reason: impl ToString) -> Self {
        GuideError::SnapshotUnavailable {
            repository: repository.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_unavailable_message() {
        let err = GuideError::snapshot_unavailable("acme/demo", "rate limited");
        assert_eq!(
            err.to_string(),
            "Snapshot unavailable for acme/demo: rate limited"
        );
    }

    #[test]
    fn test_malformed_message() {
        let err = GuideError::MalformedGuide("two run steps".to_string());
        assert!(err.to_string().contains("two run steps"));
    }
}
