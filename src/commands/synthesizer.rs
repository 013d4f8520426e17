use super::{CommandStep, Phase, TemplateTable};
use crate::signals::watchlist::{
    ENV_TEMPLATES, GO_ENTRY_FILES, NODE_ENTRY_FILES, PHP_ENTRY_FILES, PYTHON_ENTRY_FILES,
    RUBY_ENTRY_FILES, RUST_ENTRY_FILES, WEB_ENTRY_FILES,
};
use crate::signals::SignalSet;
use crate::snapshot::RepositoryInfo;
use crate::stack::{Category, Ecosystem, RuleTable, TechnologyMatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Description of the Run step emitted when no run command could be determined.
pub const SENTINEL_DESCRIPTION: &str = "Unable to determine setup";
const SENTINEL_COMMAND: &str = "# unable to determine setup: inspect the README for run instructions";

/// Entry files deeper than this are not guessed as entry points.
const MAX_ENTRY_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Languages and runtimes below this confidence get no environment setup step.
    pub min_env_confidence: u32,
}

impl SynthesizerConfig {
    /// Identifies the settings and built-in tables a synthesis was produced with.
    pub fn fingerprint(&self) -> String {
        format!("{}/min_env_confidence={}", crate::VERSION, self.min_env_confidence)
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            min_env_confidence: 50,
        }
    }
}

/// Synthesized steps plus human-readable notes about the choices made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    pub steps: Vec<CommandStep>,
    pub notes: Vec<String>,
}

impl Synthesis {
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &CommandStep> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }
}

/// Steps of one phase; identical commands are emitted once.
struct PhaseSteps {
    phase: Phase,
    steps: Vec<CommandStep>,
    seen: HashSet<String>,
}

impl PhaseSteps {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            steps: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, rendered: Rendered, technology: Option<&str>) {
        if !self.seen.insert(rendered.command.clone()) {
            debug!(phase = %self.phase, command = %rendered.command, "Duplicate command dropped");
            return;
        }
        self.steps.push(CommandStep {
            phase: self.phase,
            order: self.steps.len() as u32 + 1,
            description: rendered.description,
            command: rendered.command,
            technology: technology.map(str::to_string),
        });
    }
}

struct Rendered {
    description: String,
    command: String,
}

/// Parameter values available while rendering templates.
struct Context<'a> {
    signals: &'a SignalSet,
    repository: &'a RepositoryInfo,
    package_managers: BTreeMap<Ecosystem, String>,
}

impl Context<'_> {
    fn resolve(&self, param: &str, ecosystem: Ecosystem) -> Option<String> {
        if let Some(key) = param.strip_prefix("path:") {
            return self.signals.file_path(key).map(str::to_string);
        }
        match param {
            "repoName" => Some(self.repository.name.clone()),
            "imageName" => Some(image_name(&self.repository.name)),
            "cloneUrl" => Some(self.repository.clone_url.clone()),
            "entryFile" => self.entry_file(ecosystem),
            "entryModule" => self.entry_file(ecosystem).map(|path| {
                let stem = path.rsplit_once('.').map(|(s, _)| s).unwrap_or(&path);
                stem.replace('/', ".")
            }),
            "entryDir" => self.entry_file(ecosystem).map(|path| match path.rsplit_once('/') {
                Some((dir, _)) => format!("./{}", dir),
                None => ".".to_string(),
            }),
            "packageManager" => self.package_managers.get(&ecosystem).cloned(),
            "envTemplate" => ENV_TEMPLATES
                .iter()
                .find_map(|key| self.signals.file_path(key))
                .map(str::to_string),
            _ => None,
        }
    }

    fn entry_file(&self, ecosystem: Ecosystem) -> Option<String> {
        let candidates: &[&str] = match ecosystem {
            Ecosystem::Python => PYTHON_ENTRY_FILES,
            Ecosystem::Node => NODE_ENTRY_FILES,
            Ecosystem::Go => GO_ENTRY_FILES,
            Ecosystem::Rust => RUST_ENTRY_FILES,
            Ecosystem::Ruby => RUBY_ENTRY_FILES,
            Ecosystem::Php => PHP_ENTRY_FILES,
            Ecosystem::Web => WEB_ENTRY_FILES,
            _ => &[],
        };
        candidates.iter().find_map(|key| {
            let path = self.signals.file_path(key)?;
            (path.matches('/').count() <= MAX_ENTRY_DEPTH).then(|| path.to_string())
        })
    }
}

/// Docker image names must be lower case.
fn image_name(name: &str) -> String {
    let sanitized: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect();
    let trimmed = sanitized.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds the ordered command steps for a ranked list of technologies.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    templates: Arc<TemplateTable>,
    rules: Arc<RuleTable>,
    config: SynthesizerConfig,
}

impl CommandSynthesizer {
    pub fn new(templates: Arc<TemplateTable>, rules: Arc<RuleTable>, config: SynthesizerConfig) -> Self {
        Self {
            templates,
            rules,
            config,
        }
    }

    pub fn templates(&self) -> &TemplateTable {
        &self.templates
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Produces exactly one Clone and one Run step, with the other phases in between.
    ///
    /// `matches` must already be ranked.
    pub fn synthesize(
        &self,
        matches: &[TechnologyMatch],
        signals: &SignalSet,
        repository: &RepositoryInfo,
    ) -> Synthesis {
        let mut notes = Vec::new();
        let chosen = self.choose_package_managers(matches, &mut notes);

        let ctx = Context {
            signals,
            repository,
            package_managers: chosen
                .iter()
                .map(|pm| (pm.ecosystem, pm.executable.clone()))
                .collect(),
        };

        let mut clone = PhaseSteps::new(Phase::Clone);
        clone.push(
            Rendered {
                description: format!("Clone {}", repository.id),
                command: format!("git clone {}\ncd {}", repository.clone_url, repository.name),
            },
            None,
        );

        // Version managers first: the interpreter they install is what later steps use.
        let mut env_candidates: Vec<&TechnologyMatch> = matches
            .iter()
            .filter(|m| {
                matches!(m.category, Category::Runtime | Category::Language)
                    && m.confidence >= self.config.min_env_confidence
            })
            .collect();
        env_candidates.sort_by_key(|m| !self.pins_toolchain(m));

        let mut env = PhaseSteps::new(Phase::EnvSetup);
        for m in env_candidates {
            if let Some(rendered) = self.render_first(&m.name, m.category, m.ecosystem, Phase::EnvSetup, &ctx) {
                env.push(rendered, Some(&m.name));
            }
        }

        let mut install = PhaseSteps::new(Phase::Install);
        for pm in &chosen {
            match self.render_first(&pm.name, Category::PackageManager, pm.ecosystem, Phase::Install, &ctx) {
                Some(rendered) => install.push(rendered, Some(&pm.name)),
                None => debug!(package_manager = %pm.name, "No install template applies"),
            }
        }

        let mut configure = PhaseSteps::new(Phase::Configure);
        for m in matches {
            if let Some(rendered) = self.render_first(&m.name, m.category, m.ecosystem, Phase::Configure, &ctx) {
                configure.push(rendered, Some(&m.name));
            }
        }

        let mut run = PhaseSteps::new(Phase::Run);
        match self.choose_run(matches, &ctx) {
            Some((m, rendered)) => {
                if !is_container(&m.name) {
                    if let Some(note) = self.container_note(matches, &ctx) {
                        notes.push(note);
                    }
                }
                run.push(rendered, Some(&m.name));
            }
            None => {
                if !matches.is_empty() {
                    notes.push(
                        "No run command could be determined for the detected technologies".to_string(),
                    );
                }
                run.push(
                    Rendered {
                        description: SENTINEL_DESCRIPTION.to_string(),
                        command: SENTINEL_COMMAND.to_string(),
                    },
                    None,
                );
            }
        }

        let steps = [clone, env, install, configure, run]
            .into_iter()
            .flat_map(|phase| phase.steps)
            .collect();

        Synthesis { steps, notes }
    }

    /// One package manager per ecosystem, keyed in order of the ecosystem's first
    /// appearance in the ranking.
    fn choose_package_managers(
        &self,
        matches: &[TechnologyMatch],
        notes: &mut Vec<String>,
    ) -> Vec<ChosenManager> {
        let mut ecosystems: Vec<Ecosystem> = Vec::new();
        for m in matches {
            if m.ecosystem != Ecosystem::Agnostic && !ecosystems.contains(&m.ecosystem) {
                ecosystems.push(m.ecosystem);
            }
        }

        let mut chosen = Vec::new();
        for ecosystem in ecosystems {
            let candidates: Vec<&TechnologyMatch> = matches
                .iter()
                .filter(|m| m.category == Category::PackageManager && m.ecosystem == ecosystem)
                .collect();

            let name = if let Some(first) = candidates.first() {
                if candidates.len() > 1 {
                    let listed = candidates
                        .iter()
                        .map(|m| format!("{} ({})", m.name, m.confidence))
                        .collect::<Vec<_>>()
                        .join(", ");
                    warn!(ecosystem = %ecosystem, candidates = %listed, chosen = %first.name, "Ambiguous package manager");
                    notes.push(format!(
                        "Multiple package managers detected for {}: {}; using {}",
                        ecosystem, listed, first.name
                    ));
                }
                first.name.clone()
            } else if matches.iter().any(|m| {
                m.ecosystem == ecosystem && matches!(m.category, Category::Language | Category::Framework)
            }) {
                let Some(default) = self.rules.default_package_manager(ecosystem) else {
                    continue;
                };
                debug!(ecosystem = %ecosystem, package_manager = default.name, "Assuming default package manager");
                notes.push(format!(
                    "No package manager detected for {}; assuming {}",
                    ecosystem, default.name
                ));
                default.name.to_string()
            } else {
                continue;
            };

            let executable = self
                .templates
                .lookup(&name, Category::PackageManager)
                .and_then(|entry| entry.executable)
                .map(str::to_string)
                .unwrap_or_else(|| name.to_lowercase());

            chosen.push(ChosenManager {
                name,
                ecosystem,
                executable,
            });
        }
        chosen
    }

    fn pins_toolchain(&self, m: &TechnologyMatch) -> bool {
        self.templates
            .lookup(&m.name, m.category)
            .map(|entry| entry.pins_toolchain)
            .unwrap_or(false)
    }

    fn choose_run<'m>(&self, matches: &'m [TechnologyMatch], ctx: &Context<'_>) -> Option<(&'m TechnologyMatch, Rendered)> {
        [Category::Framework, Category::Language, Category::Runtime]
            .into_iter()
            .flat_map(|category| matches.iter().filter(move |m| m.category == category))
            .find_map(|m| {
                self.render_first(&m.name, m.category, m.ecosystem, Phase::Run, ctx)
                    .map(|rendered| (m, rendered))
            })
    }

    fn container_note(&self, matches: &[TechnologyMatch], ctx: &Context<'_>) -> Option<String> {
        matches
            .iter()
            .filter(|m| is_container(&m.name))
            .find_map(|m| self.render_first(&m.name, m.category, m.ecosystem, Phase::Run, ctx))
            .map(|rendered| {
                format!(
                    "Alternatively, run with Docker: {}",
                    rendered.command.replace('\n', " && ")
                )
            })
    }

    /// First template of the phase whose condition holds and whose parameters all resolve.
    fn render_first(
        &self,
        technology: &str,
        category: Category,
        ecosystem: Ecosystem,
        phase: Phase,
        ctx: &Context<'_>,
    ) -> Option<Rendered> {
        let entry = self.templates.lookup(technology, category)?;
        entry
            .for_phase(phase)
            .filter(|template| template.condition.holds(ctx.signals))
            .find_map(|template| {
                template
                    .render(|param| ctx.resolve(param, ecosystem))
                    .map(|command| Rendered {
                        description: template.description.to_string(),
                        command,
                    })
            })
    }
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(
            Arc::new(TemplateTable::with_defaults()),
            Arc::new(RuleTable::with_defaults()),
            SynthesizerConfig::default(),
        )
    }
}

fn is_container(name: &str) -> bool {
    matches!(name, "Docker" | "Docker Compose")
}

struct ChosenManager {
    name: String,
    ecosystem: Ecosystem,
    executable: String,
}
