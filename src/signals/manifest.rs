//! Defensive manifest parsers
//!
//! Every parser turns manifest text into a set of lower-cased tokens. Structured formats
//! that fail to parse return [`ManifestError`]; line-oriented formats skip lines they do
//! not understand. Missing keys are simply absent evidence.

use super::watchlist::ManifestFormat;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("unexpected document shape: {0}")]
    Shape(&'static str),
}

pub type Tokens = BTreeSet<String>;

const NPM_DEPENDENCY_KEYS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];
const CARGO_DEPENDENCY_KEYS: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];
const COMPOSER_DEPENDENCY_KEYS: &[&str] = &["require", "require-dev"];

pub fn parse(format: ManifestFormat, content: &str) -> Result<Tokens, ManifestError> {
    match format {
        ManifestFormat::PackageJson => parse_package_json(content),
        ManifestFormat::Requirements => Ok(parse_requirements(content)),
        ManifestFormat::Pipfile => parse_pipfile(content),
        ManifestFormat::Pyproject => parse_pyproject(content),
        ManifestFormat::CondaEnvironment => parse_conda_environment(content),
        ManifestFormat::CargoToml => parse_cargo_toml(content),
        ManifestFormat::GoMod => Ok(parse_go_mod(content)),
        ManifestFormat::ComposerJson => parse_composer_json(content),
        ManifestFormat::Gemfile => Ok(parse_gemfile(content)),
        ManifestFormat::PomXml => parse_pom_xml(content),
        ManifestFormat::Gradle => Ok(parse_gradle(content)),
    }
}

fn json_object(content: &str) -> Result<serde_json::Map<String, serde_json::Value>, ManifestError> {
    match serde_json::from_str::<serde_json::Value>(content)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ManifestError::Shape("top level is not an object")),
    }
}

fn json_keys(
    root: &serde_json::Map<String, serde_json::Value>,
    sections: &[&str],
    tokens: &mut Tokens,
) {
    for section in sections {
        if let Some(deps) = root.get(*section).and_then(|v| v.as_object()) {
            tokens.extend(deps.keys().map(|k| k.to_lowercase()));
        }
    }
}

fn toml_keys(root: &toml::Value, path: &[&str], tokens: &mut Tokens) {
    let mut value = Some(root);
    for key in path {
        value = value.and_then(|v| v.get(*key));
    }
    if let Some(table) = value.and_then(|v| v.as_table()) {
        tokens.extend(table.keys().map(|k| k.to_lowercase()));
    }
}

pub fn parse_package_json(content: &str) -> Result<Tokens, ManifestError> {
    let root = json_object(content)?;
    let mut tokens = Tokens::new();

    json_keys(&root, NPM_DEPENDENCY_KEYS, &mut tokens);

    if let Some(scripts) = root.get("scripts").and_then(|v| v.as_object()) {
        tokens.extend(scripts.keys().map(|k| format!("scripts.{}", k.to_lowercase())));
    }

    // "packageManager": "pnpm@8.15.0"
    if let Some(pm) = root.get("packageManager").and_then(|v| v.as_str()) {
        let tool = pm.split('@').next().unwrap_or(pm).trim();
        if !tool.is_empty() {
            tokens.insert(format!("packagemanager.{}", tool.to_lowercase()));
        }
    }

    Ok(tokens)
}

fn pep508_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._\-]*)").expect("static regex"))
}

/// Normalized project name from a PEP 508 requirement string.
fn requirement_name(requirement: &str) -> Option<String> {
    let caps = pep508_pattern().captures(requirement)?;
    Some(caps[1].to_lowercase().replace(['_', '.'], "-"))
}

pub fn parse_requirements(content: &str) -> Tokens {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-') && !line.contains("://"))
        .filter_map(requirement_name)
        .collect()
}

pub fn parse_pipfile(content: &str) -> Result<Tokens, ManifestError> {
    let root: toml::Value = toml::from_str(content)?;
    let mut tokens = Tokens::new();
    toml_keys(&root, &["packages"], &mut tokens);
    toml_keys(&root, &["dev-packages"], &mut tokens);
    Ok(tokens
        .into_iter()
        .map(|t| t.replace(['_', '.'], "-"))
        .collect())
}

pub fn parse_pyproject(content: &str) -> Result<Tokens, ManifestError> {
    let root: toml::Value = toml::from_str(content)?;
    let mut tokens = Tokens::new();

    let requirement_array = |value: Option<&toml::Value>, tokens: &mut Tokens| {
        if let Some(items) = value.and_then(|v| v.as_array()) {
            tokens.extend(
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .filter_map(requirement_name),
            );
        }
    };

    let project = root.get("project");
    requirement_array(project.and_then(|p| p.get("dependencies")), &mut tokens);
    if let Some(optional) = project
        .and_then(|p| p.get("optional-dependencies"))
        .and_then(|v| v.as_table())
    {
        for group in optional.values() {
            requirement_array(Some(group), &mut tokens);
        }
    }
    if let Some(groups) = root.get("dependency-groups").and_then(|v| v.as_table()) {
        for group in groups.values() {
            requirement_array(Some(group), &mut tokens);
        }
    }
    requirement_array(
        root.get("build-system").and_then(|b| b.get("requires")),
        &mut tokens,
    );

    if let Some(tool) = root.get("tool").and_then(|v| v.as_table()) {
        tokens.extend(tool.keys().map(|k| format!("tool.{}", k.to_lowercase())));

        let mut poetry = Tokens::new();
        toml_keys(&root, &["tool", "poetry", "dependencies"], &mut poetry);
        toml_keys(&root, &["tool", "poetry", "dev-dependencies"], &mut poetry);
        if let Some(groups) = root
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.get("group"))
            .and_then(|g| g.as_table())
        {
            for name in groups.keys() {
                toml_keys(
                    &root,
                    &["tool", "poetry", "group", name.as_str(), "dependencies"],
                    &mut poetry,
                );
            }
        }
        poetry.remove("python");
        tokens.extend(poetry.into_iter().map(|t| t.replace(['_', '.'], "-")));
    }

    Ok(tokens)
}

/// Conda package name from a spec like `conda-forge::numpy>=1.24`.
fn conda_name(spec: &str) -> Option<String> {
    let spec = spec.rsplit("::").next().unwrap_or(spec).trim();
    let name = spec
        .split(|c: char| matches!(c, '=' | '<' | '>' | '!' | ' ' | '['))
        .next()
        .unwrap_or("")
        .trim();
    (!name.is_empty()).then(|| name.to_lowercase())
}

pub fn parse_conda_environment(content: &str) -> Result<Tokens, ManifestError> {
    let root: serde_yaml::Value = serde_yaml::from_str(content)?;
    let mut tokens = Tokens::new();

    let Some(deps) = root.get("dependencies").and_then(|v| v.as_sequence()) else {
        return Ok(tokens);
    };

    for dep in deps {
        if let Some(spec) = dep.as_str() {
            tokens.extend(conda_name(spec));
        } else if let Some(pip) = dep.get("pip").and_then(|v| v.as_sequence()) {
            tokens.insert("pip".to_string());
            tokens.extend(
                pip.iter()
                    .filter_map(|p| p.as_str())
                    .filter_map(requirement_name),
            );
        }
    }

    Ok(tokens)
}

pub fn parse_cargo_toml(content: &str) -> Result<Tokens, ManifestError> {
    let root: toml::Value = toml::from_str(content)?;
    let mut tokens = Tokens::new();

    let mut collect = |table: Option<&toml::Value>| {
        let Some(deps) = table.and_then(|v| v.as_table()) else {
            return;
        };
        for (name, spec) in deps {
            tokens.insert(name.to_lowercase());
            // `foo = { package = "real-name" }`
            if let Some(package) = spec.get("package").and_then(|p| p.as_str()) {
                tokens.insert(package.to_lowercase());
            }
        }
    };

    for key in CARGO_DEPENDENCY_KEYS {
        collect(root.get(*key));
    }
    collect(root.get("workspace").and_then(|w| w.get("dependencies")));

    Ok(tokens)
}

pub fn parse_go_mod(content: &str) -> Tokens {
    let mut tokens = Tokens::new();
    let mut in_block = false;

    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(path) = line.split_whitespace().next() {
                tokens.insert(path.to_lowercase());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
            } else if let Some(path) = rest.split_whitespace().next() {
                tokens.insert(path.to_lowercase());
            }
        }
    }

    tokens
}

pub fn parse_composer_json(content: &str) -> Result<Tokens, ManifestError> {
    let root = json_object(content)?;
    let mut tokens = Tokens::new();
    json_keys(&root, COMPOSER_DEPENDENCY_KEYS, &mut tokens);
    Ok(tokens)
}

fn gem_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^\s*gem\s+['"]([^'"]+)['"]"#).expect("static regex"))
}

pub fn parse_gemfile(content: &str) -> Tokens {
    content
        .lines()
        .filter_map(|line| gem_pattern().captures(line))
        .map(|caps| caps[1].to_lowercase())
        .collect()
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_lowercase())
}

pub fn parse_pom_xml(content: &str) -> Result<Tokens, ManifestError> {
    let doc = roxmltree::Document::parse(content)?;
    let mut tokens = Tokens::new();

    for node in doc.descendants().filter(|n| n.is_element()) {
        let tag = node.tag_name().name();
        if !matches!(tag, "dependency" | "parent" | "plugin") {
            continue;
        }
        let artifact = child_text(node, "artifactId");
        let group = child_text(node, "groupId");

        if let Some(artifact) = &artifact {
            tokens.insert(artifact.clone());
        }
        if let (Some(group), Some(artifact)) = (&group, &artifact) {
            tokens.insert(format!("{}:{}", group, artifact));
        }
        if tag == "plugin" {
            tokens.extend(group);
        }
    }

    Ok(tokens)
}

fn gradle_coordinate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"['"]([A-Za-z0-9_.\-]+):([A-Za-z0-9_.\-]+)(?::[^'"]*)?['"]"#)
            .expect("static regex")
    })
}

fn gradle_plugin_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:\bid\s*\(?\s*|apply\s+plugin:\s*)['"]([A-Za-z0-9_.\-]+)['"]"#)
            .expect("static regex")
    })
}

fn gradle_kotlin_plugin_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\bkotlin\s*\(\s*"([A-Za-z0-9_.\-]+)"\s*\)"#).expect("static regex")
    })
}

pub fn parse_gradle(content: &str) -> Tokens {
    let mut tokens = Tokens::new();

    for caps in gradle_coordinate_pattern().captures_iter(content) {
        let group = caps[1].to_lowercase();
        let artifact = caps[2].to_lowercase();
        tokens.insert(format!("{}:{}", group, artifact));
        tokens.insert(artifact);
    }
    for caps in gradle_plugin_pattern().captures_iter(content) {
        tokens.insert(caps[1].to_lowercase());
    }
    for caps in gradle_kotlin_plugin_pattern().captures_iter(content) {
        tokens.insert(format!("org.jetbrains.kotlin.{}", caps[1].to_lowercase()));
    }

    tokens
}
