//! Normalized repository signals
//!
//! A [`Signal`] is one observed fact about a repository: a watched file is present, an
//! extension occurs N times, or a manifest lists a dependency. The [`SignalSet`] keeps at
//! most one signal per `(kind, key)`; observing the same key again updates the stored
//! value instead of appending a duplicate.

mod extractor;
pub mod manifest;
pub mod watchlist;

pub use extractor::{Extraction, ExtractorConfig, SignalExtractor, SkipReason, SkippedFile};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    FilePresence,
    ExtensionCount,
    ManifestToken,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::FilePresence => "file",
            SignalKind::ExtensionCount => "extension",
            SignalKind::ManifestToken => "token",
        }
    }
}

/// Observed value of a signal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Where the fact was observed: the shallowest path (ties broken lexically) and how
    /// many times it was seen.
    Located { path: String, occurrences: u32 },
    Count(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub key: String,
    pub value: SignalValue,
}

impl Signal {
    pub fn file(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::FilePresence,
            key: key.into(),
            value: SignalValue::Located {
                path: path.into(),
                occurrences: 1,
            },
        }
    }

    pub fn extension(key: impl Into<String>, count: u32) -> Self {
        Self {
            kind: SignalKind::ExtensionCount,
            key: key.into(),
            value: SignalValue::Count(count),
        }
    }

    pub fn token(key: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::ManifestToken,
            key: key.into(),
            value: SignalValue::Located {
                path: source.into(),
                occurrences: 1,
            },
        }
    }

    /// Path the signal was observed at, for located signals.
    pub fn path(&self) -> Option<&str> {
        match &self.value {
            SignalValue::Located { path, .. } => Some(path),
            SignalValue::Count(_) => None,
        }
    }

    pub fn count(&self) -> u32 {
        match &self.value {
            SignalValue::Located { occurrences, .. } => *occurrences,
            SignalValue::Count(n) => *n,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.value) {
            (SignalKind::FilePresence, SignalValue::Located { path, .. }) => {
                write!(f, "file {}", path)
            }
            (SignalKind::ManifestToken, SignalValue::Located { path, .. }) => {
                write!(f, "{} in {}", self.key, path)
            }
            (SignalKind::ExtensionCount, SignalValue::Count(n)) => {
                write!(f, "{} .{} files", n, self.key)
            }
            (kind, _) => write!(f, "{} {}", kind.as_str(), self.key),
        }
    }
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Keeps the shallower path, ties broken lexically.
fn prefer_path(current: &str, candidate: &str) -> bool {
    (depth(candidate), candidate) < (depth(current), current)
}

/// Deduplicated collection of signals, iterated in `(kind, key)` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSet {
    signals: BTreeMap<(SignalKind, String), Signal>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a watched file named `key` exists at `path`.
    pub fn observe_file(&mut self, key: &str, path: &str) {
        self.observe_located(SignalKind::FilePresence, key, path);
    }

    /// Records that a manifest at `source` lists `token`.
    pub fn observe_token(&mut self, token: &str, source: &str) {
        self.observe_located(SignalKind::ManifestToken, token, source);
    }

    /// Increments the count for a lower-cased extension.
    pub fn observe_extension(&mut self, extension: &str) {
        let entry = self
            .signals
            .entry((SignalKind::ExtensionCount, extension.to_string()))
            .or_insert_with(|| Signal::extension(extension, 0));
        if let SignalValue::Count(n) = &mut entry.value {
            *n += 1;
        }
    }

    fn observe_located(&mut self, kind: SignalKind, key: &str, path: &str) {
        match self.signals.get_mut(&(kind, key.to_string())) {
            Some(existing) => {
                if let SignalValue::Located {
                    path: current,
                    occurrences,
                } = &mut existing.value
                {
                    *occurrences += 1;
                    if prefer_path(current, path) {
                        *current = path.to_string();
                    }
                }
            }
            None => {
                let signal = Signal {
                    kind,
                    key: key.to_string(),
                    value: SignalValue::Located {
                        path: path.to_string(),
                        occurrences: 1,
                    },
                };
                self.signals.insert((kind, key.to_string()), signal);
            }
        }
    }

    /// Inserts a signal, replacing the value of an existing one with the same key.
    pub fn insert(&mut self, signal: Signal) {
        self.signals
            .insert((signal.kind, signal.key.clone()), signal);
    }

    pub fn get(&self, kind: SignalKind, key: &str) -> Option<&Signal> {
        self.signals.get(&(kind, key.to_string()))
    }

    pub fn file(&self, key: &str) -> Option<&Signal> {
        self.get(SignalKind::FilePresence, key)
    }

    pub fn file_path(&self, key: &str) -> Option<&str> {
        self.file(key).and_then(Signal::path)
    }

    pub fn token(&self, token: &str) -> Option<&Signal> {
        self.get(SignalKind::ManifestToken, token)
    }

    pub fn extension(&self, extension: &str) -> Option<&Signal> {
        self.get(SignalKind::ExtensionCount, extension)
    }

    pub fn extension_count(&self, extension: &str) -> u32 {
        self.extension(extension).map(Signal::count).unwrap_or(0)
    }

    pub fn tokens_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Signal> {
        self.of_kind(SignalKind::ManifestToken)
            .filter(move |s| s.key.starts_with(prefix))
    }

    pub fn of_kind(&self, kind: SignalKind) -> impl Iterator<Item = &Signal> {
        self.signals
            .range((kind, String::new())..)
            .take_while(move |((k, _), _)| *k == kind)
            .map(|(_, s)| s)
    }

    /// True when this exact signal, value included, is in the set.
    pub fn contains(&self, signal: &Signal) -> bool {
        self.get(signal.kind, &signal.key) == Some(signal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut set = SignalSet::new();
        for signal in iter {
            set.insert(signal);
        }
        set
    }
}
