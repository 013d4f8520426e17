//! Command template table
//!
//! Templates are keyed by technology name, with an optional per-category fallback.
//! Commands reference parameters as `{name}`; the supported names are:
//!
//! - `repoName`, `imageName` (lower-cased, container-safe repo name), `cloneUrl`
//! - `entryFile`, `entryModule`, `entryDir`: best-guess entry point of the ecosystem
//! - `packageManager`: executable of the chosen package manager of the ecosystem
//! - `envTemplate`: path of the env template file
//! - `path:<key>`: path of the watched file `<key>`

use super::Phase;
use super::Phase::{Configure, EnvSetup, Install, Run};
use crate::signals::SignalSet;
use crate::stack::Category;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{([A-Za-z]+(?::[^{}\s]+)?)\}").expect("static regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateCondition {
    Always,
    FilePresent(&'static str),
    AnyFilePresent(&'static [&'static str]),
    TokenPresent(&'static str),
}

impl TemplateCondition {
    pub fn holds(&self, signals: &SignalSet) -> bool {
        match self {
            TemplateCondition::Always => true,
            TemplateCondition::FilePresent(key) => signals.file(key).is_some(),
            TemplateCondition::AnyFilePresent(keys) => keys.iter().any(|k| signals.file(k).is_some()),
            TemplateCondition::TokenPresent(token) => signals.token(token).is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub phase: Phase,
    pub description: &'static str,
    pub command: &'static str,
    pub condition: TemplateCondition,
}

impl CommandTemplate {
    pub fn new(phase: Phase, description: &'static str, command: &'static str) -> Self {
        Self {
            phase,
            description,
            command,
            condition: TemplateCondition::Always,
        }
    }

    pub fn when_file(mut self, key: &'static str) -> Self {
        self.condition = TemplateCondition::FilePresent(key);
        self
    }

    pub fn when_any_file(mut self, keys: &'static [&'static str]) -> Self {
        self.condition = TemplateCondition::AnyFilePresent(keys);
        self
    }

    pub fn when_token(mut self, token: &'static str) -> Self {
        self.condition = TemplateCondition::TokenPresent(token);
        self
    }

    /// Parameter names referenced by the command, in order of first use.
    pub fn required_params(&self) -> Vec<&'static str> {
        let mut params: Vec<&'static str> = Vec::new();
        for caps in placeholder_pattern().captures_iter(self.command) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !params.contains(&name) {
                    params.push(name);
                }
            }
        }
        params
    }

    /// Substitutes every placeholder. `None` when any parameter is unresolved.
    pub fn render<F>(&self, resolve: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.command.len());
        let mut last = 0;
        for caps in placeholder_pattern().captures_iter(self.command) {
            let whole = caps.get(0)?;
            let value = resolve(&caps[1])?;
            out.push_str(&self.command[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
        }
        out.push_str(&self.command[last..]);
        Some(out)
    }
}

/// Templates of one technology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Executable substituted for `{packageManager}` when this technology is the chosen
    /// package manager.
    pub executable: Option<&'static str>,
    /// Installs the interpreter or runtime version other setup steps depend on.
    pub pins_toolchain: bool,
    pub templates: Vec<CommandTemplate>,
}

impl TemplateEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable(mut self, executable: &'static str) -> Self {
        self.executable = Some(executable);
        self
    }

    /// Environment setup of this entry runs before every other environment step.
    pub fn pins_toolchain(mut self) -> Self {
        self.pins_toolchain = true;
        self
    }

    pub fn with(mut self, template: CommandTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Candidate templates of a phase, in preference order.
    pub fn for_phase(&self, phase: Phase) -> impl Iterator<Item = &CommandTemplate> {
        self.templates.iter().filter(move |t| t.phase == phase)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateTable {
    entries: BTreeMap<String, TemplateEntry>,
    category_fallbacks: BTreeMap<Category, TemplateEntry>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, technology: &str, entry: TemplateEntry) {
        self.entries.insert(technology.to_string(), entry);
    }

    pub fn insert_category(&mut self, category: Category, entry: TemplateEntry) {
        self.category_fallbacks.insert(category, entry);
    }

    /// Entry for a technology, falling back to its category's entry.
    pub fn lookup(&self, technology: &str, category: Category) -> Option<&TemplateEntry> {
        self.entries
            .get(technology)
            .or_else(|| self.category_fallbacks.get(&category))
    }

    pub fn technologies(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.category_fallbacks.is_empty()
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (name, entry) in default_entries() {
            table.insert(name, entry);
        }
        table
    }
}

fn t(phase: Phase, description: &'static str, command: &'static str) -> CommandTemplate {
    CommandTemplate::new(phase, description, command)
}

const GRADLE_BUILDS: &[&str] = &["build.gradle", "build.gradle.kts"];

fn node_scripts() -> TemplateEntry {
    TemplateEntry::new()
        .with(t(Run, "Start the development server", "{packageManager} run dev").when_token("scripts.dev"))
        .with(t(Run, "Start the application", "{packageManager} start").when_token("scripts.start"))
}

fn cargo_run() -> TemplateEntry {
    TemplateEntry::new().with(t(Run, "Build and run the application", "cargo run"))
}

fn docker_database(description: &'static str, command: &'static str) -> TemplateEntry {
    TemplateEntry::new().with(t(Configure, description, command))
}

fn default_entries() -> Vec<(&'static str, TemplateEntry)> {
    vec![
        // Languages
        (
            "Python",
            TemplateEntry::new()
                .with(t(
                    EnvSetup,
                    "Create and activate a virtual environment",
                    "python -m venv .venv\nsource .venv/bin/activate",
                ))
                .with(t(Run, "Run the application", "python {entryFile}")),
        ),
        (
            "JavaScript",
            node_scripts().with(t(Run, "Run the entry script", "node {entryFile}")),
        ),
        (
            "TypeScript",
            node_scripts().with(t(Run, "Run the entry script", "npx tsx {entryFile}")),
        ),
        (
            "Java",
            TemplateEntry::new()
                .with(t(Run, "Run the application", "./mvnw compile exec:java").when_file("mvnw"))
                .with(t(Run, "Run the application", "mvn compile exec:java").when_file("pom.xml"))
                .with(t(Run, "Run the application", "./gradlew run").when_file("gradlew"))
                .with(t(Run, "Run the application", "gradle run").when_any_file(GRADLE_BUILDS)),
        ),
        (
            "Kotlin",
            TemplateEntry::new()
                .with(t(Run, "Run the application", "./gradlew run").when_file("gradlew"))
                .with(t(Run, "Run the application", "gradle run").when_any_file(GRADLE_BUILDS))
                .with(t(Run, "Run the application", "mvn compile exec:java").when_file("pom.xml")),
        ),
        (
            "Go",
            TemplateEntry::new()
                .with(t(Run, "Run the application", "go run {entryDir}"))
                .with(t(Run, "Run the application", "go run .").when_file("go.mod")),
        ),
        (
            "Rust",
            cargo_run().with(t(
                EnvSetup,
                "Install the stable Rust toolchain",
                "rustup toolchain install stable",
            )),
        ),
        (
            "Ruby",
            TemplateEntry::new()
                .with(t(Run, "Start the Rack application", "bundle exec rackup").when_file("config.ru"))
                .with(t(Run, "Run the application", "ruby {entryFile}")),
        ),
        (
            "PHP",
            TemplateEntry::new().with(
                t(Run, "Serve the application on http://localhost:8000", "php -S localhost:8000")
                    .when_file("index.php"),
            ),
        ),
        (
            "C#",
            TemplateEntry::new().with(t(Run, "Run the application", "dotnet run")),
        ),
        (
            "HTML",
            TemplateEntry::new().with(
                t(
                    Run,
                    "Serve the static site on http://localhost:8000",
                    "python -m http.server 8000",
                )
                .when_file("index.html"),
            ),
        ),
        // Frameworks
        (
            "Flask",
            TemplateEntry::new().with(t(Run, "Start the Flask application", "python {entryFile}")),
        ),
        (
            "Django",
            TemplateEntry::new()
                .with(
                    t(Configure, "Apply database migrations", "python {path:manage.py} migrate")
                        .when_file("manage.py"),
                )
                .with(
                    t(Run, "Start the Django development server", "python {path:manage.py} runserver")
                        .when_file("manage.py"),
                ),
        ),
        (
            "FastAPI",
            TemplateEntry::new().with(t(
                Run,
                "Start the API with auto-reload",
                "uvicorn {entryModule}:app --reload",
            )),
        ),
        (
            "Streamlit",
            TemplateEntry::new().with(t(Run, "Start the Streamlit app", "streamlit run {entryFile}")),
        ),
        (
            "Next.js",
            node_scripts().with(t(Run, "Start the development server", "npx next dev")),
        ),
        (
            "Nuxt",
            node_scripts().with(t(Run, "Start the development server", "npx nuxi dev")),
        ),
        (
            "React",
            node_scripts().with(t(Run, "Start the application", "{packageManager} start")),
        ),
        (
            "Vue.js",
            node_scripts()
                .with(
                    t(Run, "Start the development server", "{packageManager} run serve")
                        .when_token("scripts.serve"),
                )
                .with(t(Run, "Start the development server", "npx vite")),
        ),
        (
            "Angular",
            TemplateEntry::new()
                .with(t(Run, "Start the application", "{packageManager} start").when_token("scripts.start"))
                .with(t(Run, "Start the development server", "npx ng serve")),
        ),
        (
            "Express",
            node_scripts().with(t(Run, "Start the server", "node {entryFile}")),
        ),
        (
            "NestJS",
            TemplateEntry::new()
                .with(
                    t(Run, "Start the server in watch mode", "{packageManager} run start:dev")
                        .when_token("scripts.start:dev"),
                )
                .with(t(Run, "Start the server", "{packageManager} run start")),
        ),
        (
            "Svelte",
            node_scripts().with(t(Run, "Start the development server", "npx vite dev")),
        ),
        (
            "Spring Boot",
            TemplateEntry::new()
                .with(t(Run, "Start the Spring Boot application", "./mvnw spring-boot:run").when_file("mvnw"))
                .with(t(Run, "Start the Spring Boot application", "mvn spring-boot:run").when_file("pom.xml"))
                .with(t(Run, "Start the Spring Boot application", "./gradlew bootRun").when_file("gradlew"))
                .with(
                    t(Run, "Start the Spring Boot application", "gradle bootRun")
                        .when_any_file(GRADLE_BUILDS),
                ),
        ),
        (
            "Rails",
            TemplateEntry::new()
                .with(t(Configure, "Prepare the database", "bin/rails db:prepare"))
                .with(t(Run, "Start the Rails server", "bin/rails server")),
        ),
        (
            "Sinatra",
            TemplateEntry::new()
                .with(t(Run, "Start the Rack application", "bundle exec rackup").when_file("config.ru"))
                .with(t(Run, "Start the Sinatra application", "ruby {entryFile}")),
        ),
        (
            "Laravel",
            TemplateEntry::new()
                .with(
                    t(
                        Configure,
                        "Generate the application key and migrate the database",
                        "php artisan key:generate\nphp artisan migrate",
                    )
                    .when_file("artisan"),
                )
                .with(t(Run, "Start the Laravel development server", "php artisan serve")),
        ),
        (
            "Gin",
            TemplateEntry::new()
                .with(t(Run, "Start the Gin server", "go run {entryDir}"))
                .with(t(Run, "Start the Gin server", "go run .")),
        ),
        ("Actix Web", cargo_run()),
        ("Axum", cargo_run()),
        ("Rocket", cargo_run()),
        // Package managers
        (
            "pip",
            TemplateEntry::new()
                .executable("pip")
                .with(
                    t(Install, "Install Python dependencies", "pip install -r {path:requirements.txt}")
                        .when_file("requirements.txt"),
                )
                .with(
                    t(Install, "Install the project in editable mode", "pip install -e .")
                        .when_any_file(&["pyproject.toml", "setup.py"]),
                )
                .with(
                    t(
                        Install,
                        "Install Python development dependencies",
                        "pip install -r {path:requirements-dev.txt}",
                    )
                    .when_file("requirements-dev.txt"),
                ),
        ),
        (
            "Poetry",
            TemplateEntry::new()
                .executable("poetry")
                .with(t(Install, "Install dependencies with Poetry", "poetry install")),
        ),
        (
            "Pipenv",
            TemplateEntry::new().executable("pipenv").with(t(
                Install,
                "Install dependencies with Pipenv",
                "pip install pipenv\npipenv install",
            )),
        ),
        (
            "uv",
            TemplateEntry::new()
                .executable("uv")
                .with(t(Install, "Sync dependencies with uv", "uv sync")),
        ),
        (
            "Conda",
            TemplateEntry::new()
                .executable("conda")
                .with(
                    t(Install, "Create the Conda environment", "conda env create -f {path:environment.yml}")
                        .when_file("environment.yml"),
                )
                .with(
                    t(Install, "Create the Conda environment", "conda env create -f {path:environment.yaml}")
                        .when_file("environment.yaml"),
                )
                .with(
                    t(Install, "Create the Conda environment", "conda env create -f {path:conda.yml}")
                        .when_file("conda.yml"),
                ),
        ),
        (
            "npm",
            TemplateEntry::new()
                .executable("npm")
                .with(t(Install, "Install Node.js dependencies", "npm ci").when_file("package-lock.json"))
                .with(t(Install, "Install Node.js dependencies", "npm install")),
        ),
        (
            "Yarn",
            TemplateEntry::new()
                .executable("yarn")
                .with(t(Install, "Install Node.js dependencies", "yarn install")),
        ),
        (
            "pnpm",
            TemplateEntry::new()
                .executable("pnpm")
                .with(t(Install, "Install Node.js dependencies", "pnpm install")),
        ),
        (
            "Bun",
            TemplateEntry::new()
                .executable("bun")
                .with(t(Install, "Install dependencies with Bun", "bun install")),
        ),
        (
            "Maven",
            TemplateEntry::new()
                .executable("mvn")
                .with(t(Install, "Build and install with the Maven wrapper", "./mvnw clean install").when_file("mvnw"))
                .with(t(Install, "Build and install with Maven", "mvn clean install")),
        ),
        (
            "Gradle",
            TemplateEntry::new()
                .executable("gradle")
                .with(t(Install, "Build with the Gradle wrapper", "./gradlew build").when_file("gradlew"))
                .with(t(Install, "Build with Gradle", "gradle build")),
        ),
        (
            "Cargo",
            TemplateEntry::new()
                .executable("cargo")
                .with(t(Install, "Fetch crates and build", "cargo build")),
        ),
        (
            "Go modules",
            TemplateEntry::new()
                .executable("go")
                .with(t(Install, "Download Go modules", "go mod download")),
        ),
        (
            "Bundler",
            TemplateEntry::new()
                .executable("bundle")
                .with(t(Install, "Install gems", "bundle install")),
        ),
        (
            "Composer",
            TemplateEntry::new()
                .executable("composer")
                .with(t(Install, "Install PHP dependencies", "composer install")),
        ),
        (
            "dotnet CLI",
            TemplateEntry::new()
                .executable("dotnet")
                .with(t(Install, "Restore NuGet packages", "dotnet restore")),
        ),
        (
            "CMake",
            TemplateEntry::new().executable("cmake").with(t(
                Install,
                "Configure and build with CMake",
                "cmake -S . -B build\ncmake --build build",
            )),
        ),
        // Runtimes
        (
            "Node.js",
            TemplateEntry::new()
                .with(
                    t(EnvSetup, "Enable Corepack for the pinned package manager", "corepack enable")
                        .when_token("packagemanager.yarn"),
                )
                .with(
                    t(EnvSetup, "Enable Corepack for the pinned package manager", "corepack enable")
                        .when_token("packagemanager.pnpm"),
                )
                .with(t(EnvSetup, "Check that Node.js is installed (LTS recommended)", "node --version")),
        ),
        (
            "nvm",
            TemplateEntry::new()
                .pins_toolchain()
                .with(t(EnvSetup, "Install the pinned Node.js version", "nvm install\nnvm use")),
        ),
        (
            "pyenv",
            TemplateEntry::new().pins_toolchain().with(t(
                EnvSetup,
                "Install the pinned Python version",
                "pyenv install --skip-existing",
            )),
        ),
        (
            "rbenv",
            TemplateEntry::new().pins_toolchain().with(t(
                EnvSetup,
                "Install the pinned Ruby version",
                "rbenv install --skip-existing",
            )),
        ),
        (
            "Docker",
            TemplateEntry::new().with(t(
                Run,
                "Build and run the container",
                "docker build -t {imageName} .\ndocker run --rm -p 8080:8080 {imageName}",
            )),
        ),
        (
            "Docker Compose",
            TemplateEntry::new().with(t(Run, "Start all services", "docker compose up --build")),
        ),
        (
            "dotenv",
            TemplateEntry::new().with(t(
                Configure,
                "Create .env from the template and fill in the values",
                "cp {envTemplate} .env",
            )),
        ),
        // Databases
        (
            "PostgreSQL",
            docker_database(
                "Start a local PostgreSQL server",
                "docker run -d --name {imageName}-postgres -e POSTGRES_PASSWORD=postgres -p 5432:5432 postgres:16",
            ),
        ),
        (
            "MySQL",
            docker_database(
                "Start a local MySQL server",
                "docker run -d --name {imageName}-mysql -e MYSQL_ROOT_PASSWORD=mysql -p 3306:3306 mysql:8",
            ),
        ),
        (
            "MongoDB",
            docker_database(
                "Start a local MongoDB server",
                "docker run -d --name {imageName}-mongo -p 27017:27017 mongo:7",
            ),
        ),
        (
            "Redis",
            docker_database(
                "Start a local Redis server",
                "docker run -d --name {imageName}-redis -p 6379:6379 redis:7",
            ),
        ),
    ]
}
