use super::{FileEntry, RepositoryInfo, SnapshotProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const SHA_MEDIA_TYPE: &str = "application/vnd.github.sha";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

/// Public GitHub repository read through the unauthenticated REST API.
pub struct GitHubSnapshot {
    client: Client,
    api_url: Url,
    owner: String,
    repo: String,
    repository: RepositoryInfo,
    branch: OnceCell<String>,
    /// Commit the default branch pointed at on first use; `None` when it has no commits.
    commit: OnceCell<Option<String>>,
}

impl GitHubSnapshot {
    pub fn new(owner: &str, repo: &str, api_url: &str, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url).with_context(|| format!("Invalid API URL: {}", api_url))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url,
            owner: owner.to_string(),
            repo: repo.to_string(),
            repository: RepositoryInfo::new(
                format!("{}/{}", owner, repo),
                repo,
                format!("https://github.com/{}/{}.git", owner, repo),
            ),
            branch: OnceCell::new(),
            commit: OnceCell::new(),
        })
    }

    pub fn with_clone_url(mut self, clone_url: impl Into<String>) -> Self {
        self.repository.clone_url = clone_url.into();
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL cannot be a base: {}", self.api_url))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn default_branch(&self) -> Result<&String> {
        self.branch
            .get_or_try_init(|| async {
                let url = self.endpoint(&[])?;
                let response = self
                    .client
                    .get(url.clone())
                    .header(USER_AGENT, user_agent())
                    .header(ACCEPT, JSON_MEDIA_TYPE)
                    .send()
                    .await
                    .with_context(|| format!("Request to {} failed", url))?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(anyhow!("Repository not found or is private"));
                }
                if !response.status().is_success() {
                    return Err(anyhow!("GitHub API returned {} for {}", response.status(), url));
                }

                let metadata: RepoMetadata = response
                    .json()
                    .await
                    .context("Failed to parse repository metadata")?;
                debug!(branch = %metadata.default_branch, "Resolved default branch");
                Ok(metadata.default_branch)
            })
            .await
    }

    /// Commit every listing and read of this snapshot is taken from.
    async fn pinned_commit(&self) -> Result<Option<&str>> {
        let branch = self.default_branch().await?;
        let commit = self
            .commit
            .get_or_init(|| self.lookup_commit(branch))
            .await;
        Ok(commit.as_deref())
    }

    async fn lookup_commit(&self, branch: &str) -> Option<String> {
        let url = self.endpoint(&["commits", branch]).ok()?;
        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, user_agent())
            .header(ACCEPT, SHA_MEDIA_TYPE)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Commit lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), branch, "Commit lookup failed");
            return None;
        }

        let sha = response.text().await.ok()?.trim().to_string();
        if sha.is_empty() {
            return None;
        }
        debug!(commit = %sha, branch, "Pinned snapshot to commit");
        Some(sha)
    }

    /// Git ref for tree and contents requests: the pinned commit, else the branch.
    async fn git_ref(&self) -> Result<String> {
        match self.pinned_commit().await? {
            Some(sha) => Ok(sha.to_string()),
            None => Ok(self.default_branch().await?.clone()),
        }
    }
}

fn user_agent() -> String {
    format!("{}/{}", crate::NAME, crate::VERSION)
}

fn entries_from_tree(tree: Vec<TreeItem>) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = tree
        .into_iter()
        .filter_map(|item| match item.kind.as_str() {
            "blob" => {
                let entry = FileEntry::file(item.path);
                Some(match item.size {
                    Some(size) => entry.with_size(size),
                    None => entry,
                })
            }
            "tree" => Some(FileEntry::directory(item.path)),
            _ => None,
        })
        .collect();
    entries.sort();
    entries
}

#[async_trait]
impl SnapshotProvider for GitHubSnapshot {
    fn repository(&self) -> &RepositoryInfo {
        &self.repository
    }

    async fn revision(&self) -> Option<String> {
        match self.pinned_commit().await {
            Ok(commit) => commit.map(str::to_string),
            Err(e) => {
                debug!(error = %e, "Cannot resolve revision");
                None
            }
        }
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>> {
        let git_ref = self.git_ref().await?;
        let mut url = self.endpoint(&["git", "trees", &git_ref])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, user_agent())
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        // The API answers 409 for a repository without commits.
        if response.status() == StatusCode::CONFLICT {
            debug!(repository = %self.repository.id, "Repository has no commits");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(anyhow!("GitHub API returned {} for {}", response.status(), url));
        }

        let tree: TreeResponse = response
            .json()
            .await
            .context("Failed to parse repository tree")?;

        if tree.truncated {
            warn!(
                repository = %self.repository.id,
                entries = tree.tree.len(),
                "Repository tree was truncated by the API"
            );
        }

        Ok(entries_from_tree(tree.tree))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let git_ref = self.git_ref().await?;
        let mut segments = vec!["contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut().append_pair("ref", &git_ref);

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, user_agent())
            .header(ACCEPT, RAW_MEDIA_TYPE)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!("GitHub API returned {} for {}", response.status(), url));
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuideConfig;
    use crate::pipeline::GuidePipeline;
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Canned API answering by request target; unknown targets get a 404.
    struct StubApi {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubApi {
        async fn serve(routes: &[(&str, u16, &str)]) -> Self {
            let routes: HashMap<String, (u16, String)> = routes
                .iter()
                .map(|(target, status, body)| (target.to_string(), (*status, body.to_string())))
                .collect();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let seen = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((mut stream, _)) = listener.accept().await else {
                        return;
                    };
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    seen.lock().unwrap().push(target.clone());

                    let (status, body) = routes
                        .get(&target)
                        .cloned()
                        .unwrap_or((404, r#"{"message": "Not Found"}"#.to_string()));
                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
            });

            Self { url, requests }
        }

        fn snapshot(&self) -> GitHubSnapshot {
            GitHubSnapshot::new("acme", "app", &self.url, Duration::from_secs(5)).unwrap()
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    const METADATA: (&str, u16, &str) = ("/repos/acme/app", 200, r#"{"default_branch": "main"}"#);
    const COMMIT: (&str, u16, &str) = ("/repos/acme/app/commits/main", 200, "deadbeef\n");

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn snapshot() -> GitHubSnapshot {
        GitHubSnapshot::new(
            "pallets",
            "flask",
            "https://api.github.com",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_repository_info() {
        let snapshot = snapshot();
        let info = snapshot.repository();
        assert_eq!(info.id, "pallets/flask");
        assert_eq!(info.name, "flask");
        assert_eq!(info.clone_url, "https://github.com/pallets/flask.git");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let snapshot = snapshot();
        let url = snapshot
            .endpoint(&["contents", "docs", "my file.md"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/pallets/flask/contents/docs/my%20file.md"
        );
    }

    #[test]
    fn test_entries_from_tree() {
        let json = r#"{
            "sha": "abc",
            "truncated": false,
            "tree": [
                {"path": "src", "type": "tree"},
                {"path": "src/app.py", "type": "blob", "size": 120},
                {"path": "vendored", "type": "commit"},
                {"path": "README.md", "type": "blob", "size": 10}
            ]
        }"#;
        let tree: TreeResponse = serde_json::from_str(json).unwrap();
        let entries = entries_from_tree(tree.tree);

        assert_eq!(
            entries,
            vec![
                FileEntry::file("README.md").with_size(10),
                FileEntry::directory("src"),
                FileEntry::file("src/app.py").with_size(120),
            ]
        );
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(GitHubSnapshot::new("a", "b", "not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_listing_and_reads_use_the_resolved_commit() {
        let api = StubApi::serve(&[
            METADATA,
            COMMIT,
            (
                "/repos/acme/app/git/trees/deadbeef?recursive=1",
                200,
                r#"{"tree": [{"path": "requirements.txt", "type": "blob", "size": 6}]}"#,
            ),
            ("/repos/acme/app/contents/requirements.txt?ref=deadbeef", 200, "flask\n"),
        ])
        .await;
        let snapshot = api.snapshot();

        assert_eq!(snapshot.revision().await.as_deref(), Some("deadbeef"));
        assert_eq!(
            snapshot.list_files().await.unwrap(),
            vec![FileEntry::file("requirements.txt").with_size(6)]
        );
        assert_eq!(
            snapshot.read_file("requirements.txt").await.unwrap().as_deref(),
            Some("flask\n")
        );

        let requests = api.requests();
        assert!(!requests.iter().any(|r| r.contains("trees/main") || r.contains("ref=main")));
        // Metadata and commit are resolved once per snapshot.
        assert_eq!(requests.iter().filter(|r| r.contains("/commits/")).count(), 1);
        assert_eq!(requests.iter().filter(|r| *r == "/repos/acme/app").count(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let api = StubApi::serve(&[METADATA, COMMIT]).await;
        let snapshot = api.snapshot();

        assert_eq!(snapshot.read_file("missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_error_on_read_is_an_error() {
        let api = StubApi::serve(&[
            METADATA,
            COMMIT,
            ("/repos/acme/app/contents/package.json?ref=deadbeef", 500, "{}"),
        ])
        .await;

        assert!(api.snapshot().read_file("package.json").await.is_err());
    }

    #[tokio::test]
    async fn test_private_repository_is_an_error() {
        let api = StubApi::serve(&[]).await;
        let err = api.snapshot().list_files().await.unwrap_err();
        assert!(err.to_string().contains("not found or is private"));
    }

    #[tokio::test]
    async fn test_repository_without_commits_lists_nothing() {
        let empty = r#"{"message": "Git Repository is empty."}"#;
        let api = StubApi::serve(&[
            METADATA,
            ("/repos/acme/app/commits/main", 409, empty),
            ("/repos/acme/app/git/trees/main?recursive=1", 409, empty),
        ])
        .await;
        let snapshot = api.snapshot();

        assert_eq!(snapshot.revision().await, None);
        assert!(snapshot.list_files().await.unwrap().is_empty());

        let guide = GuidePipeline::new(&GuideConfig::builtin())
            .run(&snapshot)
            .await
            .unwrap();
        assert!(guide.technologies.is_empty());
        assert!(guide.is_undetermined());
    }

    #[tokio::test]
    async fn test_truncated_tree_keeps_entries_and_warns() {
        let api = StubApi::serve(&[
            METADATA,
            COMMIT,
            (
                "/repos/acme/app/git/trees/deadbeef?recursive=1",
                200,
                r#"{"truncated": true, "tree": [{"path": "go.mod", "type": "blob"}, {"path": "cmd", "type": "tree"}]}"#,
            ),
        ])
        .await;

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let entries = api.snapshot().list_files().await.unwrap();
        assert_eq!(
            entries,
            vec![FileEntry::directory("cmd"), FileEntry::file("go.mod")]
        );

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Repository tree was truncated by the API"));
    }
}
