//! Setup command synthesis
//!
//! Turns ranked technology matches into phase-ordered [`CommandStep`]s using the
//! [`TemplateTable`].

mod synthesizer;
pub mod templates;

pub use synthesizer::{CommandSynthesizer, Synthesis, SynthesizerConfig, SENTINEL_DESCRIPTION};
pub use templates::{CommandTemplate, TemplateCondition, TemplateEntry, TemplateTable};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Setup phase. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Clone,
    EnvSetup,
    Install,
    Configure,
    Run,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Clone,
        Phase::EnvSetup,
        Phase::Install,
        Phase::Configure,
        Phase::Run,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Phase::Clone => "Clone",
            Phase::EnvSetup => "Environment setup",
            Phase::Install => "Install dependencies",
            Phase::Configure => "Configure",
            Phase::Run => "Run",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStep {
    pub phase: Phase,
    /// Position within the phase, starting at 1.
    pub order: u32,
    pub description: String,
    /// Shell command; may span several lines.
    pub command: String,
    /// Technology whose template produced the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
}

impl CommandStep {
    /// Compares by `(phase, order)`.
    pub fn sequence_cmp(&self, other: &Self) -> Ordering {
        (self.phase, self.order).cmp(&(other.phase, other.order))
    }
}
