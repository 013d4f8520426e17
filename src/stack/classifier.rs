use super::{RuleTable, TechnologyMatch};
use crate::signals::SignalSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Applies the rule table to a signal set. Never fails.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<RuleTable>,
}

impl Classifier {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Ranked matches. Every rule is evaluated independently; co-occurring ecosystems are
    /// all reported.
    pub fn classify(&self, signals: &SignalSet) -> Vec<TechnologyMatch> {
        let mut matches: Vec<TechnologyMatch> = self
            .rules
            .rules()
            .iter()
            .filter_map(|rule| {
                let m = rule.evaluate(signals);
                if let Some(m) = &m {
                    trace!(
                        technology = rule.name,
                        confidence = m.confidence,
                        evidence = m.evidence.len(),
                        "Rule fired"
                    );
                }
                m
            })
            .collect();

        matches.sort_by(|a, b| a.rank_cmp(b));

        debug!(
            technologies = ?matches.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            "Classification complete"
        );

        matches
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(RuleTable::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{Category, Ecosystem, Predicate, Rule};

    fn names(matches: &[TechnologyMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_empty_signals_yield_no_matches() {
        assert!(Classifier::default().classify(&SignalSet::new()).is_empty());
    }

    #[test]
    fn test_flask_project() {
        let mut signals = SignalSet::new();
        signals.observe_file("requirements.txt", "requirements.txt");
        signals.observe_file("app.py", "app.py");
        signals.observe_extension("py");
        signals.observe_token("flask", "requirements.txt");

        let matches = Classifier::default().classify(&signals);
        assert_eq!(names(&matches), vec!["Flask", "Python", "pip"]);

        let flask = &matches[0];
        assert_eq!(flask.category, Category::Framework);
        assert_eq!(flask.confidence, 80);
        assert_eq!(matches[1].confidence, 70);
        assert_eq!(matches[2].confidence, 70);
    }

    #[test]
    fn test_co_occurring_ecosystems_are_kept() {
        let mut signals = SignalSet::new();
        signals.observe_file("package.json", "package.json");
        signals.observe_file("requirements.txt", "requirements.txt");
        signals.observe_token("react", "package.json");

        let matches = Classifier::default().classify(&signals);
        let found = names(&matches);
        for expected in ["React", "JavaScript", "Node.js", "Python", "pip"] {
            assert!(found.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_ranking_ties_are_deterministic() {
        let rules = RuleTable::new(vec![
            Rule::new("b-tool", Category::Runtime, Ecosystem::Agnostic, 50, Predicate::Token("x")),
            Rule::new("a-tool", Category::Runtime, Ecosystem::Agnostic, 50, Predicate::Token("x")),
            Rule::new("lang", Category::Language, Ecosystem::Agnostic, 50, Predicate::Token("x")),
            Rule::new("top", Category::Database, Ecosystem::Agnostic, 90, Predicate::Token("x")),
        ]);
        let mut signals = SignalSet::new();
        signals.observe_token("x", "package.json");

        let matches = Classifier::new(Arc::new(rules)).classify(&signals);
        assert_eq!(names(&matches), vec!["top", "lang", "a-tool", "b-tool"]);
    }

    #[test]
    fn test_evidence_comes_from_signal_set() {
        let mut signals = SignalSet::new();
        signals.observe_file("go.mod", "go.mod");
        signals.observe_file("main.go", "cmd/server/main.go");
        signals.observe_extension("go");
        signals.observe_token("github.com/gin-gonic/gin", "go.mod");

        let matches = Classifier::default().classify(&signals);
        assert!(!matches.is_empty());
        for m in &matches {
            assert!(!m.evidence.is_empty());
            assert!(m.evidence.iter().all(|s| signals.contains(s)));
        }
    }
}
