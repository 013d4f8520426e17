//! Watched file names, ignored directories and manifest formats

use crate::snapshot::FileEntry;

/// File names recorded as `FilePresence` signals. Matching is case-insensitive and the
/// key is the spelling below.
pub const WATCHED_FILES: &[&str] = &[
    // Python
    "requirements.txt",
    "requirements-dev.txt",
    "setup.py",
    "setup.cfg",
    "pyproject.toml",
    "Pipfile",
    "Pipfile.lock",
    "poetry.lock",
    "uv.lock",
    "environment.yml",
    "environment.yaml",
    "conda.yml",
    ".python-version",
    "manage.py",
    "app.py",
    "main.py",
    "run.py",
    "server.py",
    "wsgi.py",
    "streamlit_app.py",
    // Node / JavaScript / TypeScript
    "package.json",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "tsconfig.json",
    ".nvmrc",
    ".node-version",
    "next.config.js",
    "next.config.mjs",
    "next.config.ts",
    "nuxt.config.js",
    "nuxt.config.ts",
    "vue.config.js",
    "angular.json",
    "svelte.config.js",
    "vite.config.js",
    "vite.config.ts",
    "nest-cli.json",
    "server.js",
    "app.js",
    "index.js",
    "main.js",
    "server.ts",
    "index.ts",
    "main.ts",
    // JVM
    "pom.xml",
    "mvnw",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "gradlew",
    "gradle.properties",
    // Go
    "go.mod",
    "go.sum",
    "main.go",
    // Rust
    "Cargo.toml",
    "Cargo.lock",
    "main.rs",
    // Ruby
    "Gemfile",
    "Gemfile.lock",
    ".ruby-version",
    "Rakefile",
    "config.ru",
    "app.rb",
    // PHP
    "composer.json",
    "composer.lock",
    "artisan",
    "index.php",
    // C / C++
    "CMakeLists.txt",
    "Makefile",
    // Static web
    "index.html",
    // Containers and environment
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    ".env.example",
    ".env.sample",
    ".env.template",
    // Databases
    "schema.prisma",
    "database.yml",
    "db.sqlite3",
];

/// Suffixes whose files are recorded under the key `*<suffix>`.
pub const WATCHED_SUFFIXES: &[&str] = &[".csproj", ".fsproj", ".sln", ".sqlite", ".db"];

/// Directory names recorded as `FilePresence` signals.
pub const WATCHED_DIRECTORIES: &[&str] = &[".streamlit", ".devcontainer", "migrations"];

/// Directories whose contents never produce signals.
pub const IGNORED_DIRECTORIES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "vendor",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".gradle",
    ".idea",
    ".vscode",
    "coverage",
];

/// Env template files, in the order they are preferred.
pub const ENV_TEMPLATES: &[&str] = &[".env.example", ".env.sample", ".env.template"];

pub const PYTHON_ENTRY_FILES: &[&str] = &[
    "app.py",
    "main.py",
    "streamlit_app.py",
    "run.py",
    "server.py",
    "wsgi.py",
];
pub const NODE_ENTRY_FILES: &[&str] = &[
    "server.js",
    "app.js",
    "index.js",
    "main.js",
    "server.ts",
    "index.ts",
    "main.ts",
];
pub const GO_ENTRY_FILES: &[&str] = &["main.go"];
pub const RUST_ENTRY_FILES: &[&str] = &["main.rs"];
pub const RUBY_ENTRY_FILES: &[&str] = &["config.ru", "app.rb"];
pub const PHP_ENTRY_FILES: &[&str] = &["index.php"];
pub const WEB_ENTRY_FILES: &[&str] = &["index.html"];

/// True when any ancestor directory of the entry, or the entry itself when it is a
/// directory, is on the ignore list.
pub fn is_ignored(entry: &FileEntry) -> bool {
    let ignored = |c: &str| IGNORED_DIRECTORIES.contains(&c);
    entry.parent_components().any(ignored) || (entry.is_directory && ignored(entry.name()))
}

/// `FilePresence` key for an entry, if it is watched.
pub fn watch_key(entry: &FileEntry) -> Option<String> {
    let name = entry.name();

    if entry.is_directory {
        return WATCHED_DIRECTORIES
            .iter()
            .find(|w| w.eq_ignore_ascii_case(name))
            .map(|w| w.to_string());
    }

    if let Some(watched) = WATCHED_FILES.iter().find(|w| w.eq_ignore_ascii_case(name)) {
        return Some(watched.to_string());
    }

    let lower = name.to_ascii_lowercase();
    WATCHED_SUFFIXES
        .iter()
        .find(|suffix| lower.len() > suffix.len() && lower.ends_with(*suffix))
        .map(|suffix| format!("*{}", suffix))
}

/// Structured manifests read for dependency tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestFormat {
    PackageJson,
    Requirements,
    Pipfile,
    Pyproject,
    CondaEnvironment,
    CargoToml,
    GoMod,
    ComposerJson,
    Gemfile,
    PomXml,
    Gradle,
}

impl ManifestFormat {
    pub fn for_key(key: &str) -> Option<Self> {
        let format = match key {
            "package.json" => ManifestFormat::PackageJson,
            "requirements.txt" | "requirements-dev.txt" => ManifestFormat::Requirements,
            "Pipfile" => ManifestFormat::Pipfile,
            "pyproject.toml" => ManifestFormat::Pyproject,
            "environment.yml" | "environment.yaml" | "conda.yml" => {
                ManifestFormat::CondaEnvironment
            }
            "Cargo.toml" => ManifestFormat::CargoToml,
            "go.mod" => ManifestFormat::GoMod,
            "composer.json" => ManifestFormat::ComposerJson,
            "Gemfile" => ManifestFormat::Gemfile,
            "pom.xml" => ManifestFormat::PomXml,
            "build.gradle" | "build.gradle.kts" => ManifestFormat::Gradle,
            _ => return None,
        };
        Some(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_key_is_case_insensitive() {
        assert_eq!(
            watch_key(&FileEntry::file("dockerfile")),
            Some("Dockerfile".to_string())
        );
        assert_eq!(
            watch_key(&FileEntry::file("sub/PIPFILE")),
            Some("Pipfile".to_string())
        );
        assert_eq!(watch_key(&FileEntry::file("README.md")), None);
    }

    #[test]
    fn test_watch_key_suffix() {
        assert_eq!(
            watch_key(&FileEntry::file("src/Api/Api.csproj")),
            Some("*.csproj".to_string())
        );
        assert_eq!(watch_key(&FileEntry::file(".csproj")), None);
    }

    #[test]
    fn test_watch_key_directory() {
        assert_eq!(
            watch_key(&FileEntry::directory(".streamlit")),
            Some(".streamlit".to_string())
        );
        assert_eq!(watch_key(&FileEntry::directory("package.json")), None);
    }

    #[test]
    fn test_is_ignored() {
        assert!(is_ignored(&FileEntry::file("node_modules/react/package.json")));
        assert!(is_ignored(&FileEntry::file("a/b/__pycache__/x.pyc")));
        assert!(is_ignored(&FileEntry::directory("vendor")));
        assert!(!is_ignored(&FileEntry::file("vendor.py")));
        assert!(!is_ignored(&FileEntry::file("src/app.py")));
    }

    #[test]
    fn test_manifest_format() {
        assert_eq!(
            ManifestFormat::for_key("package.json"),
            Some(ManifestFormat::PackageJson)
        );
        assert_eq!(
            ManifestFormat::for_key("build.gradle.kts"),
            Some(ManifestFormat::Gradle)
        );
        assert_eq!(ManifestFormat::for_key("yarn.lock"), None);
    }

    #[test]
    fn test_entry_files_are_watched() {
        for name in PYTHON_ENTRY_FILES
            .iter()
            .chain(NODE_ENTRY_FILES)
            .chain(GO_ENTRY_FILES)
            .chain(RUST_ENTRY_FILES)
            .chain(RUBY_ENTRY_FILES)
            .chain(PHP_ENTRY_FILES)
            .chain(WEB_ENTRY_FILES)
            .chain(ENV_TEMPLATES)
        {
            assert!(WATCHED_FILES.contains(name), "{} is not watched", name);
        }
    }
}
