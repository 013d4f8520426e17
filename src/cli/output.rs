//! Output formatting for guides, rule listings and configuration
//!
//! Every renderer is a pure function of its input, so the same guide always renders to
//! the same bytes.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::commands::{CommandStep, Phase};
use crate::config::GuideConfig;
use crate::guide::SetupGuide;
use crate::stack::{RuleTable, TechnologyMatch};

const HEADER_LINE: &str = "\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Markdown,
    Json,
    Yaml,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_guide(&self, guide: &SetupGuide) -> Result<String> {
        match self.format {
            OutputFormat::Json => guide.to_json(),
            OutputFormat::Yaml => guide.to_yaml(),
            OutputFormat::Human => Ok(format_guide_human(guide)),
            OutputFormat::Markdown => Ok(format_guide_markdown(guide)),
        }
    }

    pub fn format_rules(&self, rules: &RuleTable) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => {
                let rows: Vec<serde_json::Value> = rules
                    .rules()
                    .iter()
                    .map(|rule| {
                        serde_json::json!({
                            "name": rule.name,
                            "category": rule.category,
                            "ecosystem": rule.ecosystem,
                            "base_confidence": rule.base_confidence,
                            "ecosystem_default": rule.ecosystem_default,
                        })
                    })
                    .collect();
                if self.format == OutputFormat::Yaml {
                    serde_yaml::to_string(&rows).context("Failed to serialize rules to YAML")
                } else {
                    serde_json::to_string_pretty(&rows).context("Failed to serialize rules to JSON")
                }
            }
            OutputFormat::Human | OutputFormat::Markdown => Ok(format_rules_human(rules)),
        }
    }

    pub fn format_config(&self, config: &GuideConfig) -> Result<String> {
        // BTreeMap for stable key order.
        let map: BTreeMap<String, String> = config.to_display_map().into_iter().collect();
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&map).context("Failed to serialize config to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(&map).context("Failed to serialize config to YAML")
            }
            OutputFormat::Human | OutputFormat::Markdown => Ok(config.to_string()),
        }
    }
}

fn evidence_summary(technology: &TechnologyMatch) -> String {
    technology
        .evidence
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Non-empty phases in execution order, numbered from 1.
fn numbered_phases(guide: &SetupGuide) -> Vec<(usize, Phase, Vec<&CommandStep>)> {
    Phase::ALL
        .iter()
        .map(|phase| (*phase, guide.steps_in(*phase).collect::<Vec<_>>()))
        .filter(|(_, steps)| !steps.is_empty())
        .enumerate()
        .map(|(i, (phase, steps))| (i + 1, phase, steps))
        .collect()
}

fn format_guide_human(guide: &SetupGuide) -> String {
    let mut out = String::new();
    let title = format!("Setup guide for {}", guide.repository_name);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}\n", HEADER_LINE.repeat(title.chars().count()));

    if guide.technologies.is_empty() {
        let _ = writeln!(out, "No technologies detected.\n");
    } else {
        let _ = writeln!(out, "Detected technologies:");
        let width = guide
            .technologies
            .iter()
            .map(|t| t.name.chars().count())
            .max()
            .unwrap_or(0);
        for t in &guide.technologies {
            let _ = writeln!(
                out,
                "  {:<width$}  {:<14}  {:>3}  {}",
                t.name,
                t.category.as_str(),
                t.confidence,
                evidence_summary(t),
                width = width
            );
        }
        out.push('\n');
    }

    for (number, phase, steps) in numbered_phases(guide) {
        let _ = writeln!(out, "{}. {}", number, phase.title());
        for step in steps {
            let _ = writeln!(out, "   {}", step.description);
            for line in step.command.lines() {
                let _ = writeln!(out, "     $ {}", line);
            }
        }
        out.push('\n');
    }

    if !guide.notes.is_empty() {
        let _ = writeln!(out, "Notes:");
        for note in &guide.notes {
            let _ = writeln!(out, "  - {}", note);
        }
    }

    out
}

fn format_guide_markdown(guide: &SetupGuide) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Setup guide: {}\n", guide.repository_name);

    let _ = writeln!(out, "## Detected technologies\n");
    if guide.technologies.is_empty() {
        let _ = writeln!(out, "_No technologies detected._\n");
    } else {
        let _ = writeln!(out, "| Technology | Category | Confidence | Evidence |");
        let _ = writeln!(out, "|---|---|---|---|");
        for t in &guide.technologies {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                t.name,
                t.category,
                t.confidence,
                evidence_summary(t).replace('|', "\\|")
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Steps\n");
    for (number, phase, steps) in numbered_phases(guide) {
        let _ = writeln!(out, "### {}. {}\n", number, phase.title());
        for step in steps {
            let _ = writeln!(out, "{}\n", step.description);
            let _ = writeln!(out, "```bash\n{}\n```\n", step.command);
        }
    }

    if !guide.notes.is_empty() {
        let _ = writeln!(out, "## Notes\n");
        for note in &guide.notes {
            let _ = writeln!(out, "- {}", note);
        }
    }

    out
}

fn format_rules_human(rules: &RuleTable) -> String {
    let mut out = String::new();
    let width = rules
        .rules()
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let _ = writeln!(
        out,
        "{:<width$}  {:<14}  {:<9}  {:>4}",
        "NAME",
        "CATEGORY",
        "ECOSYSTEM",
        "BASE",
        width = width
    );
    for rule in rules.rules() {
        let default = if rule.ecosystem_default { "  (default)" } else { "" };
        let _ = writeln!(
            out,
            "{:<width$}  {:<14}  {:<9}  {:>4}{}",
            rule.name,
            rule.category.as_str(),
            rule.ecosystem.as_str(),
            rule.base_confidence,
            default,
            width = width
        );
    }
    let _ = writeln!(out, "\n{} rules", rules.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandSynthesizer;
    use crate::guide::GuideAssembler;
    use crate::signals::SignalSet;
    use crate::snapshot::RepositoryInfo;
    use crate::stack::Classifier;

    fn guide() -> SetupGuide {
        let mut signals = SignalSet::new();
        signals.observe_file("requirements.txt", "requirements.txt");
        signals.observe_file("app.py", "app.py");
        signals.observe_file("Dockerfile", "Dockerfile");
        signals.observe_extension("py");
        signals.observe_token("flask", "requirements.txt");
        let repository = RepositoryInfo::new("acme/demo", "demo", "https://github.com/acme/demo.git");

        let technologies = Classifier::default().classify(&signals);
        let synthesis = CommandSynthesizer::default().synthesize(&technologies, &signals, &repository);
        GuideAssembler::new()
            .assemble(&repository, technologies, synthesis, &signals)
            .unwrap()
    }

    #[test]
    fn test_json_format() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_guide(&guide())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["repository_name"], "demo");
        assert_eq!(parsed["technologies"][0]["name"], "Flask");
    }

    #[test]
    fn test_yaml_format() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_guide(&guide())
            .unwrap();
        assert!(output.contains("repository_name: demo"));
    }

    #[test]
    fn test_human_format() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_guide(&guide())
            .unwrap();
        assert!(output.starts_with("Setup guide for demo\n"));
        assert!(output.contains("1. Clone"));
        assert!(output.contains("     $ git clone https://github.com/acme/demo.git"));
        assert!(output.contains("     $ python app.py"));
        assert!(output.contains("Notes:"));
        assert!(output.contains("Alternatively, run with Docker"));
    }

    #[test]
    fn test_markdown_format() {
        let output = OutputFormatter::new(OutputFormat::Markdown)
            .format_guide(&guide())
            .unwrap();
        assert!(output.starts_with("# Setup guide: demo\n"));
        assert!(output.contains("| Flask | Framework | 80 |"));
        assert!(output.contains("```bash\npython app.py\n```"));
        assert!(output.contains("## Notes"));
    }

    #[test]
    fn test_phase_numbering_skips_empty_phases() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_guide(&guide())
            .unwrap();
        // Clone, Environment setup, Install, Run; no Configure step.
        assert!(output.contains("4. Run"));
        assert!(!output.contains("Configure"));
    }

    #[test]
    fn test_rules_formats() {
        let rules = RuleTable::with_defaults();
        let human = OutputFormatter::new(OutputFormat::Human)
            .format_rules(&rules)
            .unwrap();
        assert!(human.starts_with("NAME"));
        assert!(human.contains(&format!("{} rules", rules.len())));

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_rules(&rules)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), rules.len());
        assert_eq!(parsed[0]["name"], rules.rules()[0].name);
    }

    #[test]
    fn test_config_formats() {
        let config = GuideConfig::builtin();
        let json = OutputFormatter::new(OutputFormat::Json)
            .format_config(&config)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["max_concurrent_reads"], "8");

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_config(&config)
            .unwrap();
        assert!(human.contains("Repoguide Configuration:"));
    }
}
