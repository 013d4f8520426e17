//! Setup guide assembly
//!
//! [`GuideAssembler`] pairs the ranked technologies with the synthesized steps. It adds
//! no logic of its own beyond checking the guide invariants; a violation means an
//! upstream component is broken and is reported as [`GuideError::MalformedGuide`].

pub mod validator;

pub use validator::{GuideRule, GuideValidator};

use crate::commands::{CommandStep, Phase, Synthesis};
use crate::error::GuideError;
use crate::signals::SignalSet;
use crate::snapshot::RepositoryInfo;
use crate::stack::TechnologyMatch;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupGuide {
    pub repository_name: String,
    /// Ranked, highest confidence first.
    pub technologies: Vec<TechnologyMatch>,
    /// Ordered by `(phase, order)`.
    pub steps: Vec<CommandStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl SetupGuide {
    pub fn steps_in(&self, phase: Phase) -> impl Iterator<Item = &CommandStep> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }

    pub fn run_step(&self) -> Option<&CommandStep> {
        self.steps_in(Phase::Run).next()
    }

    /// True when the Run step is the "unable to determine setup" placeholder.
    pub fn is_undetermined(&self) -> bool {
        self.run_step()
            .map(|s| s.technology.is_none())
            .unwrap_or(true)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize SetupGuide to JSON")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize SetupGuide to YAML")
    }
}

#[derive(Default)]
pub struct GuideAssembler {
    validator: GuideValidator,
}

impl GuideAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(validator: GuideValidator) -> Self {
        Self { validator }
    }

    pub fn assemble(
        &self,
        repository: &RepositoryInfo,
        technologies: Vec<TechnologyMatch>,
        synthesis: Synthesis,
        signals: &SignalSet,
    ) -> Result<SetupGuide, GuideError> {
        let guide = SetupGuide {
            repository_name: repository.name.clone(),
            technologies,
            steps: synthesis.steps,
            notes: synthesis.notes,
        };

        self.validator
            .validate(&guide, signals)
            .map_err(|e| GuideError::MalformedGuide(e.to_string()))?;

        Ok(guide)
    }
}
