//! Rule table: declarative technology detection rules

use super::{Category, Ecosystem, TechnologyMatch};
use crate::signals::{Signal, SignalKind, SignalSet};
use std::collections::{BTreeSet, HashSet};

/// Added when a match's evidence spans at least two signal kinds.
pub const CORROBORATION_BONUS: u32 = 10;

/// Condition over a signal set. A predicate that holds yields the signals it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// A watched file (or directory) with this key is present
    FileExists(&'static str),
    /// At least one of the watched files is present
    AnyFile(&'static [&'static str]),
    /// The extension occurs at least N times
    ExtensionAtLeast(&'static str, u32),
    /// A manifest lists this token
    Token(&'static str),
    /// A manifest lists a token starting with this prefix
    TokenPrefix(&'static str),
    AnyOf(Vec<Predicate>),
    AllOf(Vec<Predicate>),
}

impl Predicate {
    pub fn evaluate(&self, signals: &SignalSet) -> Option<BTreeSet<Signal>> {
        match self {
            Predicate::FileExists(key) => signals.file(key).map(|s| BTreeSet::from([s.clone()])),
            Predicate::AnyFile(keys) => {
                let found: BTreeSet<Signal> =
                    keys.iter().filter_map(|k| signals.file(k)).cloned().collect();
                (!found.is_empty()).then_some(found)
            }
            Predicate::ExtensionAtLeast(ext, min) => signals
                .extension(ext)
                .filter(|s| s.count() >= *min)
                .map(|s| BTreeSet::from([s.clone()])),
            Predicate::Token(token) => signals.token(token).map(|s| BTreeSet::from([s.clone()])),
            Predicate::TokenPrefix(prefix) => {
                let found: BTreeSet<Signal> = signals.tokens_with_prefix(prefix).cloned().collect();
                (!found.is_empty()).then_some(found)
            }
            Predicate::AnyOf(predicates) => {
                let found: BTreeSet<Signal> = predicates
                    .iter()
                    .filter_map(|p| p.evaluate(signals))
                    .flatten()
                    .collect();
                (!found.is_empty()).then_some(found)
            }
            Predicate::AllOf(predicates) => {
                let mut found = BTreeSet::new();
                for predicate in predicates {
                    found.extend(predicate.evaluate(signals)?);
                }
                (!found.is_empty()).then_some(found)
            }
        }
    }
}

/// Which signals a fired rule cites as evidence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EvidenceSelector {
    /// Only the signals matched by the rule's predicate
    #[default]
    PredicateOnly,
    /// The predicate's signals plus those of every corroborating predicate that holds
    WithCorroborators(Vec<Predicate>),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    pub ecosystem: Ecosystem,
    pub predicate: Predicate,
    pub base_confidence: u32,
    pub evidence: EvidenceSelector,
    /// Conventional package manager of its ecosystem, used when none is detected.
    pub ecosystem_default: bool,
}

impl Rule {
    pub fn new(
        name: &'static str,
        category: Category,
        ecosystem: Ecosystem,
        base_confidence: u32,
        predicate: Predicate,
    ) -> Self {
        Self {
            name,
            category,
            ecosystem,
            predicate,
            base_confidence,
            evidence: EvidenceSelector::PredicateOnly,
            ecosystem_default: false,
        }
    }

    pub fn corroborated_by(mut self, predicate: Predicate) -> Self {
        if let EvidenceSelector::WithCorroborators(list) = &mut self.evidence {
            list.push(predicate);
        } else {
            self.evidence = EvidenceSelector::WithCorroborators(vec![predicate]);
        }
        self
    }

    pub fn ecosystem_default(mut self) -> Self {
        self.ecosystem_default = true;
        self
    }

    /// Fires the rule. Returns `None` when the predicate does not hold.
    pub fn evaluate(&self, signals: &SignalSet) -> Option<TechnologyMatch> {
        let mut evidence = self.predicate.evaluate(signals)?;

        if let EvidenceSelector::WithCorroborators(corroborators) = &self.evidence {
            for corroborator in corroborators {
                if let Some(found) = corroborator.evaluate(signals) {
                    evidence.extend(found);
                }
            }
        }

        if evidence.is_empty() {
            return None;
        }

        let kinds: BTreeSet<SignalKind> = evidence.iter().map(|s| s.kind).collect();
        let bonus = if kinds.len() >= 2 {
            CORROBORATION_BONUS
        } else {
            0
        };

        Some(TechnologyMatch {
            name: self.name.to_string(),
            category: self.category,
            ecosystem: self.ecosystem,
            confidence: self.base_confidence + bonus,
            evidence,
        })
    }
}

/// Ordered, immutable collection of detection rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Builds a table, dropping later rules whose name repeats an earlier one.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut seen = HashSet::new();
        let rules = rules
            .into_iter()
            .filter(|r| seen.insert(r.name))
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Default package manager of an ecosystem.
    pub fn default_package_manager(&self, ecosystem: Ecosystem) -> Option<&Rule> {
        self.rules.iter().find(|r| {
            r.category == Category::PackageManager && r.ecosystem == ecosystem && r.ecosystem_default
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn with_defaults() -> Self {
        let mut rules = Vec::new();
        rules.extend(language_rules());
        rules.extend(framework_rules());
        rules.extend(package_manager_rules());
        rules.extend(runtime_rules());
        rules.extend(database_rules());
        Self::new(rules)
    }
}

use Category::*;
use Predicate::*;

const PYTHON_MANIFESTS: &[&str] = &[
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "Pipfile",
    "environment.yml",
    "environment.yaml",
    "conda.yml",
];
const CONDA_FILES: &[&str] = &["environment.yml", "environment.yaml", "conda.yml"];
const GRADLE_FILES: &[&str] = &[
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "gradlew",
];
const DOTNET_PROJECTS: &[&str] = &["*.csproj", "*.fsproj", "*.sln"];
const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];
const ENV_TEMPLATES: &[&str] = &[".env.example", ".env.sample", ".env.template"];
const NEXT_CONFIGS: &[&str] = &["next.config.js", "next.config.mjs", "next.config.ts"];
const NUXT_CONFIGS: &[&str] = &["nuxt.config.js", "nuxt.config.ts"];
const NODE_ENTRIES: &[&str] = &["server.js", "app.js", "index.js", "server.ts", "index.ts"];

fn language_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "Python",
            Language,
            Ecosystem::Python,
            60,
            AnyOf(vec![ExtensionAtLeast("py", 1), AnyFile(PYTHON_MANIFESTS)]),
        ),
        Rule::new(
            "JavaScript",
            Language,
            Ecosystem::Node,
            55,
            AnyOf(vec![
                ExtensionAtLeast("js", 1),
                ExtensionAtLeast("jsx", 1),
                ExtensionAtLeast("mjs", 1),
                FileExists("package.json"),
            ]),
        ),
        Rule::new(
            "TypeScript",
            Language,
            Ecosystem::Node,
            60,
            AnyOf(vec![
                ExtensionAtLeast("ts", 1),
                ExtensionAtLeast("tsx", 1),
                FileExists("tsconfig.json"),
            ]),
        )
        .corroborated_by(Token("typescript")),
        Rule::new(
            "Java",
            Language,
            Ecosystem::Jvm,
            60,
            AnyOf(vec![ExtensionAtLeast("java", 1), FileExists("pom.xml")]),
        ),
        Rule::new(
            "Kotlin",
            Language,
            Ecosystem::Jvm,
            60,
            AnyOf(vec![
                ExtensionAtLeast("kt", 1),
                TokenPrefix("org.jetbrains.kotlin"),
            ]),
        ),
        Rule::new(
            "Go",
            Language,
            Ecosystem::Go,
            60,
            AnyOf(vec![ExtensionAtLeast("go", 1), FileExists("go.mod")]),
        ),
        Rule::new(
            "Rust",
            Language,
            Ecosystem::Rust,
            60,
            AnyOf(vec![ExtensionAtLeast("rs", 1), FileExists("Cargo.toml")]),
        ),
        Rule::new(
            "Ruby",
            Language,
            Ecosystem::Ruby,
            60,
            AnyOf(vec![ExtensionAtLeast("rb", 1), FileExists("Gemfile")]),
        ),
        Rule::new(
            "PHP",
            Language,
            Ecosystem::Php,
            60,
            AnyOf(vec![ExtensionAtLeast("php", 1), FileExists("composer.json")]),
        ),
        Rule::new(
            "C#",
            Language,
            Ecosystem::Dotnet,
            60,
            AnyOf(vec![ExtensionAtLeast("cs", 1), AnyFile(DOTNET_PROJECTS)]),
        ),
        Rule::new(
            "C++",
            Language,
            Ecosystem::Cpp,
            55,
            AnyOf(vec![
                ExtensionAtLeast("cpp", 1),
                ExtensionAtLeast("cc", 1),
                ExtensionAtLeast("cxx", 1),
                ExtensionAtLeast("hpp", 1),
                FileExists("CMakeLists.txt"),
            ]),
        ),
        Rule::new("HTML", Language, Ecosystem::Web, 40, ExtensionAtLeast("html", 1))
            .corroborated_by(FileExists("index.html")),
    ]
}

fn framework_rules() -> Vec<Rule> {
    vec![
        Rule::new("Flask", Framework, Ecosystem::Python, 70, Token("flask"))
            .corroborated_by(AnyFile(&["app.py", "wsgi.py"])),
        Rule::new(
            "Django",
            Framework,
            Ecosystem::Python,
            70,
            AnyOf(vec![Token("django"), FileExists("manage.py")]),
        ),
        Rule::new("FastAPI", Framework, Ecosystem::Python, 70, Token("fastapi"))
            .corroborated_by(Token("uvicorn"))
            .corroborated_by(AnyFile(&["main.py", "app.py"])),
        Rule::new(
            "Streamlit",
            Framework,
            Ecosystem::Python,
            70,
            AnyOf(vec![Token("streamlit"), FileExists(".streamlit")]),
        )
        .corroborated_by(AnyFile(&["streamlit_app.py", "app.py"])),
        Rule::new(
            "Next.js",
            Framework,
            Ecosystem::Node,
            80,
            AnyOf(vec![Token("next"), AnyFile(NEXT_CONFIGS)]),
        ),
        Rule::new(
            "Nuxt",
            Framework,
            Ecosystem::Node,
            80,
            AnyOf(vec![Token("nuxt"), AnyFile(NUXT_CONFIGS)]),
        ),
        Rule::new("React", Framework, Ecosystem::Node, 70, Token("react")).corroborated_by(
            AnyOf(vec![ExtensionAtLeast("jsx", 1), ExtensionAtLeast("tsx", 1)]),
        ),
        Rule::new(
            "Vue.js",
            Framework,
            Ecosystem::Node,
            70,
            AnyOf(vec![Token("vue"), FileExists("vue.config.js")]),
        )
        .corroborated_by(ExtensionAtLeast("vue", 1)),
        Rule::new(
            "Angular",
            Framework,
            Ecosystem::Node,
            75,
            AnyOf(vec![Token("@angular/core"), FileExists("angular.json")]),
        ),
        Rule::new("Express", Framework, Ecosystem::Node, 65, Token("express"))
            .corroborated_by(AnyFile(NODE_ENTRIES)),
        Rule::new(
            "NestJS",
            Framework,
            Ecosystem::Node,
            75,
            AnyOf(vec![Token("@nestjs/core"), FileExists("nest-cli.json")]),
        ),
        Rule::new(
            "Svelte",
            Framework,
            Ecosystem::Node,
            70,
            AnyOf(vec![
                Token("svelte"),
                Token("@sveltejs/kit"),
                FileExists("svelte.config.js"),
            ]),
        ),
        Rule::new(
            "Spring Boot",
            Framework,
            Ecosystem::Jvm,
            75,
            AnyOf(vec![
                TokenPrefix("spring-boot"),
                Token("org.springframework.boot"),
            ]),
        )
        .corroborated_by(AnyOf(vec![
            ExtensionAtLeast("java", 1),
            ExtensionAtLeast("kt", 1),
        ])),
        Rule::new("Rails", Framework, Ecosystem::Ruby, 75, Token("rails"))
            .corroborated_by(AnyFile(&["config.ru", "Rakefile"])),
        Rule::new("Sinatra", Framework, Ecosystem::Ruby, 70, Token("sinatra"))
            .corroborated_by(AnyFile(&["app.rb", "config.ru"])),
        Rule::new(
            "Laravel",
            Framework,
            Ecosystem::Php,
            75,
            AnyOf(vec![Token("laravel/framework"), FileExists("artisan")]),
        ),
        Rule::new(
            "Gin",
            Framework,
            Ecosystem::Go,
            70,
            Token("github.com/gin-gonic/gin"),
        )
        .corroborated_by(FileExists("main.go")),
        Rule::new("Actix Web", Framework, Ecosystem::Rust, 70, Token("actix-web"))
            .corroborated_by(FileExists("main.rs")),
        Rule::new("Axum", Framework, Ecosystem::Rust, 70, Token("axum"))
            .corroborated_by(FileExists("main.rs")),
        Rule::new("Rocket", Framework, Ecosystem::Rust, 70, Token("rocket"))
            .corroborated_by(FileExists("main.rs")),
    ]
}

fn package_manager_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "pip",
            PackageManager,
            Ecosystem::Python,
            60,
            AnyFile(&["requirements.txt", "requirements-dev.txt"]),
        )
        .corroborated_by(ExtensionAtLeast("py", 1))
        .ecosystem_default(),
        Rule::new(
            "Poetry",
            PackageManager,
            Ecosystem::Python,
            70,
            AnyOf(vec![FileExists("poetry.lock"), Token("tool.poetry")]),
        ),
        Rule::new(
            "Pipenv",
            PackageManager,
            Ecosystem::Python,
            70,
            AnyFile(&["Pipfile", "Pipfile.lock"]),
        ),
        Rule::new(
            "uv",
            PackageManager,
            Ecosystem::Python,
            75,
            AnyOf(vec![FileExists("uv.lock"), Token("tool.uv")]),
        ),
        Rule::new(
            "Conda",
            PackageManager,
            Ecosystem::Python,
            65,
            AnyFile(CONDA_FILES),
        ),
        Rule::new(
            "npm",
            PackageManager,
            Ecosystem::Node,
            70,
            AnyFile(&["package-lock.json", "npm-shrinkwrap.json"]),
        )
        .corroborated_by(Token("packagemanager.npm"))
        .ecosystem_default(),
        Rule::new("Yarn", PackageManager, Ecosystem::Node, 70, FileExists("yarn.lock"))
            .corroborated_by(Token("packagemanager.yarn")),
        Rule::new(
            "pnpm",
            PackageManager,
            Ecosystem::Node,
            70,
            FileExists("pnpm-lock.yaml"),
        )
        .corroborated_by(Token("packagemanager.pnpm")),
        Rule::new(
            "Bun",
            PackageManager,
            Ecosystem::Node,
            70,
            AnyFile(&["bun.lockb", "bun.lock"]),
        )
        .corroborated_by(Token("packagemanager.bun")),
        Rule::new(
            "Maven",
            PackageManager,
            Ecosystem::Jvm,
            75,
            AnyFile(&["pom.xml", "mvnw"]),
        )
        .ecosystem_default(),
        Rule::new("Gradle", PackageManager, Ecosystem::Jvm, 75, AnyFile(GRADLE_FILES)),
        Rule::new("Cargo", PackageManager, Ecosystem::Rust, 80, FileExists("Cargo.toml"))
            .ecosystem_default(),
        Rule::new("Go modules", PackageManager, Ecosystem::Go, 80, FileExists("go.mod"))
            .ecosystem_default(),
        Rule::new(
            "Bundler",
            PackageManager,
            Ecosystem::Ruby,
            75,
            AnyFile(&["Gemfile", "Gemfile.lock"]),
        )
        .ecosystem_default(),
        Rule::new(
            "Composer",
            PackageManager,
            Ecosystem::Php,
            75,
            AnyFile(&["composer.json", "composer.lock"]),
        )
        .ecosystem_default(),
        Rule::new(
            "dotnet CLI",
            PackageManager,
            Ecosystem::Dotnet,
            75,
            AnyFile(DOTNET_PROJECTS),
        )
        .ecosystem_default(),
        Rule::new("CMake", PackageManager, Ecosystem::Cpp, 70, FileExists("CMakeLists.txt"))
            .ecosystem_default(),
    ]
}

fn runtime_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "Node.js",
            Runtime,
            Ecosystem::Node,
            60,
            AnyOf(vec![
                FileExists("package.json"),
                AnyFile(&[".nvmrc", ".node-version"]),
            ]),
        )
        .corroborated_by(AnyOf(vec![
            ExtensionAtLeast("js", 1),
            ExtensionAtLeast("ts", 1),
        ])),
        Rule::new("Docker", Runtime, Ecosystem::Agnostic, 50, FileExists("Dockerfile")),
        Rule::new(
            "Docker Compose",
            Runtime,
            Ecosystem::Agnostic,
            55,
            AnyFile(COMPOSE_FILES),
        ),
        Rule::new("pyenv", Runtime, Ecosystem::Python, 55, FileExists(".python-version")),
        Rule::new("nvm", Runtime, Ecosystem::Node, 55, FileExists(".nvmrc")),
        Rule::new("rbenv", Runtime, Ecosystem::Ruby, 55, FileExists(".ruby-version")),
        Rule::new(
            "dotenv",
            Runtime,
            Ecosystem::Agnostic,
            50,
            AnyOf(vec![
                AnyFile(ENV_TEMPLATES),
                Token("python-dotenv"),
                Token("dotenv"),
            ]),
        ),
    ]
}

fn database_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "PostgreSQL",
            Database,
            Ecosystem::Agnostic,
            60,
            AnyOf(vec![
                Token("psycopg2"),
                Token("psycopg2-binary"),
                Token("psycopg"),
                Token("asyncpg"),
                Token("pg"),
                Token("postgresql"),
                Token("org.postgresql:postgresql"),
                Token("github.com/lib/pq"),
                TokenPrefix("github.com/jackc/pgx"),
                Token("tokio-postgres"),
            ]),
        ),
        Rule::new(
            "MySQL",
            Database,
            Ecosystem::Agnostic,
            60,
            AnyOf(vec![
                Token("mysqlclient"),
                Token("pymysql"),
                Token("mysql"),
                Token("mysql2"),
                Token("mysql-connector-j"),
                Token("github.com/go-sql-driver/mysql"),
            ]),
        ),
        Rule::new(
            "MongoDB",
            Database,
            Ecosystem::Agnostic,
            60,
            AnyOf(vec![
                Token("pymongo"),
                Token("motor"),
                Token("mongoose"),
                Token("mongodb"),
                Token("mongoid"),
                Token("go.mongodb.org/mongo-driver"),
            ]),
        ),
        Rule::new(
            "Redis",
            Database,
            Ecosystem::Agnostic,
            60,
            AnyOf(vec![
                Token("redis"),
                Token("ioredis"),
                TokenPrefix("github.com/redis/go-redis"),
            ]),
        ),
        Rule::new(
            "SQLite",
            Database,
            Ecosystem::Agnostic,
            55,
            AnyOf(vec![
                AnyFile(&["db.sqlite3", "*.sqlite", "*.db"]),
                Token("sqlite3"),
                Token("better-sqlite3"),
                Token("rusqlite"),
            ]),
        ),
    ]
}
