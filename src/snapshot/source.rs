use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Where a repository snapshot comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositorySource {
    GitHub { owner: String, repo: String },
    Local(PathBuf),
}

fn github_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:https?://|ssh://git@|git@)?(?:www\.)?github\.com[/:]([A-Za-z0-9_.\-]+)/([A-Za-z0-9_.\-]+?)(?:\.git)?(?:/.*)?(?:[#?].*)?$")
            .expect("static regex")
    })
}

impl RepositorySource {
    /// Interprets user input as a GitHub repository reference or a local path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if let Some(caps) = github_pattern().captures(trimmed) {
            return RepositorySource::GitHub {
                owner: caps[1].to_string(),
                repo: caps[2].to_string(),
            };
        }
        RepositorySource::Local(PathBuf::from(trimmed))
    }
}

impl fmt::Display for RepositorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositorySource::GitHub { owner, repo } => write!(f, "github.com/{}/{}", owner, repo),
            RepositorySource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github(owner: &str, repo: &str) -> RepositorySource {
        RepositorySource::GitHub {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    #[test]
    fn test_parse_https_url() {
        assert_eq!(
            RepositorySource::parse("https://github.com/pallets/flask"),
            github("pallets", "flask")
        );
    }

    #[test]
    fn test_parse_strips_git_suffix() {
        assert_eq!(
            RepositorySource::parse("https://github.com/pallets/flask.git"),
            github("pallets", "flask")
        );
    }

    #[test]
    fn test_parse_ssh_url() {
        assert_eq!(
            RepositorySource::parse("git@github.com:rust-lang/cargo.git"),
            github("rust-lang", "cargo")
        );
    }

    #[test]
    fn test_parse_bare_host() {
        assert_eq!(
            RepositorySource::parse("github.com/vercel/next.js"),
            github("vercel", "next.js")
        );
    }

    #[test]
    fn test_parse_tree_url() {
        assert_eq!(
            RepositorySource::parse("https://github.com/pallets/flask/tree/main/src"),
            github("pallets", "flask")
        );
    }

    #[test]
    fn test_parse_local_path() {
        assert_eq!(
            RepositorySource::parse("./some/dir"),
            RepositorySource::Local(PathBuf::from("./some/dir"))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(github("a", "b").to_string(), "github.com/a/b");
    }
}
