//! GitHub repository fetcher.
//!
//! Lists the branch tree through the git trees API, then downloads every file
//! with the configured extension through the contents API. Downloads run with
//! bounded concurrency; a file that cannot be fetched is logged and skipped.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use apiforge_schema::Repository;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use thiserror::Error;

use crate::version::APIFORGE_VERSION;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid repository reference '{0}', expected <owner>/<repo>")]
    InvalidReference(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub branch: String,
    /// Files kept from the tree, e.g. `.py`.
    pub extension: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_concurrent: usize,
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            branch: "main".to_string(),
            extension: ".py".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            max_concurrent: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GithubConfig {
    /// Read `GITHUB_TOKEN` and `APIFORGE_GITHUB_API_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token: std::env::var("GITHUB_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            api_url: std::env::var("APIFORGE_GITHUB_API_URL")
                .ok()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.api_url.clone()),
            ..defaults
        }
    }
}

/// Split `owner/repo` (or a `https://github.com/owner/repo[.git]` URL).
pub fn parse_repo_ref(reference: &str) -> Result<(String, String), FetchError> {
    let trimmed = reference
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("github.com/")
        .trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let mut parts = trimmed.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(FetchError::InvalidReference(reference.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

pub struct GithubFetcher {
    config: GithubConfig,
    client: reqwest::Client,
}

impl GithubFetcher {
    pub fn new(config: GithubConfig) -> Result<Self, FetchError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = &config.token
            && let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("token {token}"))
        {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("apiforge/{APIFORGE_VERSION}"))
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    /// GET with a fixed delay between attempts on transport errors, 429 and 5xx.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut attempt = 0;
        loop {
            let error = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() != 429 && !status.is_server_error() {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    }
                }
                Err(e) => FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                },
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                tracing::error!(url, attempts = attempt, error = %error, "GitHub request failed after max retries");
                return Err(error);
            }

            tracing::warn!(
                url,
                attempt,
                backoff_ms = self.config.retry_delay.as_millis(),
                error = %error,
                "GitHub request failed, retrying"
            );
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.get_with_retry(url)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_with_retry(url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/repos/{owner}/{repo}",
            self.config.api_url.trim_end_matches('/')
        )
    }

    /// Paths of every blob with the configured extension on the branch.
    pub async fn list_files(&self, owner: &str, repo: &str) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/git/trees/{}?recursive=1",
            self.repo_url(owner, repo),
            self.config.branch
        );
        let tree: TreeResponse = self.get_json(&url).await?;
        if tree.truncated {
            tracing::warn!(owner, repo, "GitHub tree listing was truncated");
        }

        let mut paths: Vec<String> = tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob" && e.path.ends_with(&self.config.extension))
            .map(|e| e.path)
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Text of one file: inline base64 content, else the raw download URL.
    pub async fn fetch_file(&self, owner: &str, repo: &str, path: &str) -> Result<String, FetchError> {
        let url = format!(
            "{}/contents/{path}?ref={}",
            self.repo_url(owner, repo),
            self.config.branch
        );
        let body: ContentResponse = self.get_json(&url).await?;

        if body.encoding.as_deref() == Some("base64")
            && let Some(content) = body.content.as_deref().filter(|c| !c.is_empty())
        {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD.decode(compact).map_err(|e| FetchError::Decode {
                url: url.clone(),
                reason: format!("invalid base64 content: {e}"),
            })?;
            return String::from_utf8(bytes).map_err(|_| FetchError::Decode {
                url,
                reason: "content is not valid UTF-8".to_string(),
            });
        }

        match body.download_url {
            Some(download_url) => self.get_text(&download_url).await,
            None => Err(FetchError::Decode {
                url,
                reason: "neither content nor download_url present".to_string(),
            }),
        }
    }

    /// Download every matching file of `owner/repo`.
    pub async fn fetch(&self, owner: &str, repo: &str) -> Result<Repository, FetchError> {
        let paths = self.list_files(owner, repo).await?;
        tracing::info!(owner, repo, files = paths.len(), "listed repository");

        let results: Vec<(String, Result<String, FetchError>)> = stream::iter(paths)
            .map(|path| async move {
                let result = self.fetch_file(owner, repo, &path).await;
                (path, result)
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut repository = Repository::new();
        let mut skipped = 0;
        for (path, result) in results {
            match result {
                Ok(source) => repository.insert(path, source),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(file = %path, error = %e, "skipping file that failed to download");
                }
            }
        }

        tracing::info!(
            owner,
            repo,
            fetched = repository.len(),
            skipped,
            "fetched repository"
        );
        Ok(repository)
    }

    /// [`fetch`](Self::fetch) and mirror every file under `dest`.
    pub async fn fetch_into(
        &self,
        owner: &str,
        repo: &str,
        dest: &Path,
    ) -> Result<Repository, FetchError> {
        let repository = self.fetch(owner, repo).await?;
        mirror(&repository, dest).await?;
        Ok(repository)
    }
}

/// Join a repository path onto `dest`, refusing absolute or parent components.
fn mirror_path(dest: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(dest.join(relative))
    } else {
        None
    }
}

/// Write every file of `repository` under `dest`, keeping relative paths.
pub async fn mirror(repository: &Repository, dest: &Path) -> Result<(), FetchError> {
    for (relative, source) in &repository.files {
        let Some(path) = mirror_path(dest, relative) else {
            tracing::warn!(file = %relative, "refusing to mirror path outside destination");
            continue;
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&path, source)
            .await
            .map_err(|source| FetchError::Io {
                path: path.display().to_string(),
                source,
            })?;
    }
    tracing::debug!(dest = %dest.display(), files = repository.len(), "mirrored repository");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> GithubConfig {
        GithubConfig {
            token: Some("ghp_test".to_string()),
            api_url: server.uri(),
            retry_delay: Duration::from_millis(1),
            max_retries: 2,
            ..GithubConfig::default()
        }
    }

    async fn mount_tree(server: &MockServer, entries: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main"))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc",
                "tree": entries,
                "truncated": false
            })))
            .mount(server)
            .await;
    }

    async fn mount_content(server: &MockServer, file: &str, source: &str) {
        // GitHub wraps base64 content at 60 columns.
        let encoded = STANDARD.encode(source);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/repos/octo/demo/contents/{file}")))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": file,
                "encoding": "base64",
                "content": wrapped.join("\n"),
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn parses_repository_references() {
        assert_eq!(
            parse_repo_ref("octo/demo").unwrap(),
            ("octo".to_string(), "demo".to_string())
        );
        assert_eq!(
            parse_repo_ref("https://github.com/octo/demo.git").unwrap(),
            ("octo".to_string(), "demo".to_string())
        );
        for bad in ["octo", "octo/", "/demo", "a/b/c", ""] {
            assert!(
                matches!(parse_repo_ref(bad), Err(FetchError::InvalidReference(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn config_defaults() {
        let config = GithubConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.branch, "main");
        assert_eq!(config.extension, ".py");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.max_concurrent, 8);
    }

    #[tokio::test]
    async fn lists_only_matching_blobs() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!([
                {"path": "app.py", "type": "blob"},
                {"path": "pkg", "type": "tree"},
                {"path": "pkg/util.py", "type": "blob"},
                {"path": "README.md", "type": "blob"},
                {"path": "weird.py", "type": "tree"}
            ]),
        )
        .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        let files = fetcher.list_files("octo", "demo").await.unwrap();
        assert_eq!(files, ["app.py", "pkg/util.py"]);
    }

    #[tokio::test]
    async fn sends_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main"))
            .and(header("authorization", "token ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tree": []})))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        assert!(fetcher.list_files("octo", "demo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetches_base64_and_download_url_content() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!([
                {"path": "app.py", "type": "blob"},
                {"path": "pkg/raw.py", "type": "blob"}
            ]),
        )
        .await;
        let long_source = format!("def f():\n    return {:?}\n", "x".repeat(120));
        mount_content(&server, "app.py", &long_source).await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/pkg/raw.py"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "raw.py",
                "content": "",
                "download_url": format!("{}/raw/octo/demo/main/pkg/raw.py", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/octo/demo/main/pkg/raw.py"))
            .respond_with(ResponseTemplate::new(200).set_body_string("def g():\n    pass\n"))
            .mount(&server)
            .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        let repo = fetcher.fetch("octo", "demo").await.unwrap();
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.files["app.py"], long_source);
        assert_eq!(repo.files["pkg/raw.py"], "def g():\n    pass\n");
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree": [{"path": "a.py", "type": "blob"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        assert_eq!(fetcher.list_files("octo", "demo").await.unwrap(), ["a.py"]);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        let err = fetcher.list_files("octo", "demo").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn missing_repository_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        let err = fetcher.fetch("octo", "demo").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn failed_files_are_skipped() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!([
                {"path": "good.py", "type": "blob"},
                {"path": "gone.py", "type": "blob"}
            ]),
        )
        .await;
        mount_content(&server, "good.py", "def ok():\n    pass\n").await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/gone.py"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        let repo = fetcher.fetch("octo", "demo").await.unwrap();
        assert_eq!(repo.files.keys().collect::<Vec<_>>(), ["good.py"]);
    }

    #[tokio::test]
    async fn mirrors_into_destination() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!([{"path": "pkg/mod.py", "type": "blob"}]),
        )
        .await;
        mount_content(&server, "pkg/mod.py", "def m():\n    pass\n").await;

        let dest = tempfile::tempdir().unwrap();
        let fetcher = GithubFetcher::new(test_config(&server)).unwrap();
        fetcher.fetch_into("octo", "demo", dest.path()).await.unwrap();

        let written = std::fs::read_to_string(dest.path().join("pkg/mod.py")).unwrap();
        assert_eq!(written, "def m():\n    pass\n");
    }

    #[test]
    fn mirror_refuses_escaping_paths() {
        let dest = Path::new("/tmp/out");
        assert_eq!(
            mirror_path(dest, "a/b.py"),
            Some(PathBuf::from("/tmp/out/a/b.py"))
        );
        assert_eq!(mirror_path(dest, "../b.py"), None);
        assert_eq!(mirror_path(dest, "/etc/b.py"), None);
    }
}
