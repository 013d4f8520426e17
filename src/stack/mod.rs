//! Technology stack classification
//!
//! The [`RuleTable`] is static configuration: one [`Rule`] per technology, each a
//! declarative [`Predicate`] over the signal set plus a base confidence. The
//! [`Classifier`] evaluates every rule independently and ranks the matches.
//!
//! Ranking is total: confidence descending, then [`Category`] priority, then name.
//!
//! ```
//! use repoguide::signals::SignalSet;
//! use repoguide::stack::{Classifier, RuleTable};
//! use std::sync::Arc;
//!
//! let mut signals = SignalSet::new();
//! signals.observe_file("requirements.txt", "requirements.txt");
//! signals.observe_token("flask", "requirements.txt");
//!
//! let classifier = Classifier::new(Arc::new(RuleTable::with_defaults()));
//! let matches = classifier.classify(&signals);
//! assert!(matches.iter().any(|m| m.name == "Flask"));
//! ```

mod classifier;
pub mod rules;

pub use classifier::Classifier;
pub use rules::{EvidenceSelector, Predicate, Rule, RuleTable};

use crate::signals::Signal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Technology category. Declaration order is ranking priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Language,
    Framework,
    PackageManager,
    Runtime,
    Database,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Language,
        Category::Framework,
        Category::PackageManager,
        Category::Runtime,
        Category::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Language => "Language",
            Category::Framework => "Framework",
            Category::PackageManager => "PackageManager",
            Category::Runtime => "Runtime",
            Category::Database => "Database",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tooling ecosystem a technology belongs to. Package-manager conflicts are only
/// resolved between members of the same ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    Python,
    Node,
    Jvm,
    Go,
    Rust,
    Ruby,
    Php,
    Dotnet,
    Cpp,
    Web,
    /// Not tied to one language (containers, env files, databases).
    Agnostic,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Python => "Python",
            Ecosystem::Node => "Node",
            Ecosystem::Jvm => "JVM",
            Ecosystem::Go => "Go",
            Ecosystem::Rust => "Rust",
            Ecosystem::Ruby => "Ruby",
            Ecosystem::Php => "PHP",
            Ecosystem::Dotnet => ".NET",
            Ecosystem::Cpp => "C/C++",
            Ecosystem::Web => "Web",
            Ecosystem::Agnostic => "Agnostic",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected technology with its score and supporting signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyMatch {
    pub name: String,
    pub category: Category,
    pub ecosystem: Ecosystem,
    pub confidence: u32,
    pub evidence: BTreeSet<Signal>,
}

impl TechnologyMatch {
    /// Ranking order: higher confidence first, then category priority, then name.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .confidence
            .cmp(&self.confidence)
            .then(self.category.cmp(&other.category))
            .then_with(|| {
                self.name
                    .to_lowercase()
                    .cmp(&other.name.to_lowercase())
                    .then(self.name.cmp(&other.name))
            })
    }
}
