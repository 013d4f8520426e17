use super::SetupGuide;
use crate::commands::Phase;
use crate::signals::SignalSet;
use anyhow::Result;
use std::cmp::Ordering;

pub trait GuideRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, guide: &SetupGuide, signals: &SignalSet) -> Result<()>;
}

/// Technologies are strictly ordered by rank.
pub struct RankOrderRule;

impl GuideRule for RankOrderRule {
    fn name(&self) -> &'static str {
        "RankOrder"
    }

    fn validate(&self, guide: &SetupGuide, _signals: &SignalSet) -> Result<()> {
        for pair in guide.technologies.windows(2) {
            if pair[0].rank_cmp(&pair[1]) != Ordering::Less {
                anyhow::bail!("{} is ranked before {}", pair[0].name, pair[1].name);
            }
        }
        Ok(())
    }
}

/// Every technology cites at least one signal, and only signals that were observed.
pub struct EvidenceRule;

impl GuideRule for EvidenceRule {
    fn name(&self) -> &'static str {
        "Evidence"
    }

    fn validate(&self, guide: &SetupGuide, signals: &SignalSet) -> Result<()> {
        for technology in &guide.technologies {
            if technology.evidence.is_empty() {
                anyhow::bail!("{} has no evidence", technology.name);
            }
            if let Some(unknown) = technology.evidence.iter().find(|s| !signals.contains(s)) {
                anyhow::bail!("{} cites unobserved signal '{}'", technology.name, unknown);
            }
        }
        Ok(())
    }
}

/// Steps are strictly increasing by `(phase, order)` with non-empty commands.
pub struct StepSequenceRule;

impl GuideRule for StepSequenceRule {
    fn name(&self) -> &'static str {
        "StepSequence"
    }

    fn validate(&self, guide: &SetupGuide, _signals: &SignalSet) -> Result<()> {
        if let Some(empty) = guide.steps.iter().find(|s| s.command.trim().is_empty()) {
            anyhow::bail!("{} step {} has an empty command", empty.phase, empty.order);
        }
        for pair in guide.steps.windows(2) {
            if pair[0].sequence_cmp(&pair[1]) != Ordering::Less {
                anyhow::bail!(
                    "{} step {} does not precede {} step {}",
                    pair[0].phase,
                    pair[0].order,
                    pair[1].phase,
                    pair[1].order
                );
            }
        }
        Ok(())
    }
}

/// Exactly one Clone step and exactly one Run step.
pub struct SingleCloneAndRunRule;

impl GuideRule for SingleCloneAndRunRule {
    fn name(&self) -> &'static str {
        "SingleCloneAndRun"
    }

    fn validate(&self, guide: &SetupGuide, _signals: &SignalSet) -> Result<()> {
        for phase in [Phase::Clone, Phase::Run] {
            let count = guide.steps_in(phase).count();
            if count != 1 {
                anyhow::bail!("expected one {} step, found {}", phase, count);
            }
        }
        Ok(())
    }
}

pub struct GuideValidator {
    rules: Vec<Box<dyn GuideRule>>,
}

impl GuideValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn GuideRule>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, guide: &SetupGuide, signals: &SignalSet) -> Result<()> {
        for rule in &self.rules {
            if let Err(e) = rule.validate(guide, signals) {
                anyhow::bail!("[{}] {}", rule.name(), e);
            }
        }
        Ok(())
    }
}

impl Default for GuideValidator {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(RankOrderRule),
                Box::new(EvidenceRule),
                Box::new(StepSequenceRule),
                Box::new(SingleCloneAndRunRule),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandStep;
    use crate::signals::Signal;
    use crate::stack::{Category, Ecosystem, TechnologyMatch};
    use std::collections::BTreeSet;

    fn step(phase: Phase, order: u32, command: &str) -> CommandStep {
        CommandStep {
            phase,
            order,
            description: "step".to_string(),
            command: command.to_string(),
            technology: None,
        }
    }

    fn tech(name: &str, confidence: u32, evidence: Signal) -> TechnologyMatch {
        TechnologyMatch {
            name: name.to_string(),
            category: Category::Language,
            ecosystem: Ecosystem::Python,
            confidence,
            evidence: BTreeSet::from([evidence]),
        }
    }

    fn signals() -> SignalSet {
        let mut set = SignalSet::new();
        set.observe_file("app.py", "app.py");
        set
    }

    fn valid_guide() -> SetupGuide {
        SetupGuide {
            repository_name: "demo".to_string(),
            technologies: vec![tech("Python", 60, Signal::file("app.py", "app.py"))],
            steps: vec![
                step(Phase::Clone, 1, "git clone x\ncd demo"),
                step(Phase::Install, 1, "pip install -r requirements.txt"),
                step(Phase::Run, 1, "python app.py"),
            ],
            notes: vec![],
        }
    }

    #[test]
    fn test_valid_guide() {
        assert!(GuideValidator::new().validate(&valid_guide(), &signals()).is_ok());
    }

    #[test]
    fn test_unobserved_evidence() {
        let mut guide = valid_guide();
        guide.technologies = vec![tech("Python", 60, Signal::file("main.py", "main.py"))];
        let err = GuideValidator::new().validate(&guide, &signals()).unwrap_err();
        assert!(err.to_string().contains("[Evidence]"));
    }

    #[test]
    fn test_empty_evidence() {
        let mut guide = valid_guide();
        guide.technologies[0].evidence.clear();
        let err = GuideValidator::new().validate(&guide, &signals()).unwrap_err();
        assert!(err.to_string().contains("no evidence"));
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let mut guide = valid_guide();
        guide.steps.insert(2, step(Phase::Install, 1, "npm install"));
        let err = GuideValidator::new().validate(&guide, &signals()).unwrap_err();
        assert!(err.to_string().contains("[StepSequence]"));
    }

    #[test]
    fn test_two_run_steps_rejected() {
        let mut guide = valid_guide();
        guide.steps.push(step(Phase::Run, 2, "npm start"));
        let err = GuideValidator::new().validate(&guide, &signals()).unwrap_err();
        assert!(err.to_string().contains("[SingleCloneAndRun]"));
    }

    #[test]
    fn test_missing_clone_rejected() {
        let mut guide = valid_guide();
        guide.steps.remove(0);
        assert!(GuideValidator::new().validate(&guide, &signals()).is_err());
    }

    #[test]
    fn test_custom_rules() {
        let mut guide = valid_guide();
        guide.steps.clear();
        let validator = GuideValidator::with_rules(vec![Box::new(RankOrderRule)]);
        assert!(validator.validate(&guide, &signals()).is_ok());
    }
}
