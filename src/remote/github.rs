//! GitHub REST API implementation of [`RemoteRepository`].

use super::error::RemoteError;
use super::slug::RepoSlug;
use super::types::*;
use super::{RemoteRepository, RemoteResult};
use crate::config::{Config, MergeStrategy};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

const USER_AGENT: &str = concat!("baton/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;

/// Blocking GitHub client bound to one repository.
pub struct GitHubClient {
    slug: RepoSlug,
    api_base_url: Url,
    token: SecretString,
    http: Client,
}

impl GitHubClient {
    /// Creates a client for `slug` using the API base URL and timeout from `config`.
    pub fn new(slug: RepoSlug, token: SecretString, config: &Config) -> RemoteResult<Self> {
        let api_base_url = Url::parse(&config.api_base_url).map_err(|e| {
            RemoteError::Decode(format!(
                "invalid api_base_url '{}': {}",
                config.api_base_url, e
            ))
        })?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            slug,
            api_base_url,
            token,
            http,
        })
    }

    /// `{api}/repos/{owner}/{name}/{path}` with every path segment escaped.
    fn repo_url(&self, path: &str) -> RemoteResult<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Decode("api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("repos")
            .push(&self.slug.owner)
            .push(&self.slug.name)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(self.token.expose_secret())
    }

    fn execute(&self, builder: RequestBuilder) -> RemoteResult<Value> {
        let response = builder
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RemoteError::from_response(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn get<T: DeserializeOwned>(&self, url: Url) -> RemoteResult<T> {
        tracing::debug!(%url, "GET");
        let value = self.execute(self.request(Method::GET, url))?;
        decode(value)
    }

    fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> RemoteResult<T> {
        tracing::debug!(%method, %url, "send");
        let value = self.execute(self.request(method, url).json(body))?;
        decode(value)
    }

    /// GET every page of a list endpoint.
    fn get_all<T: DeserializeOwned>(&self, url: Url) -> RemoteResult<Vec<T>> {
        collect_pages(PAGE_SIZE, |page| {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            self.get(page_url)
        })
    }
}

/// Fetch pages starting at 1 until one comes back shorter than `page_size`.
fn collect_pages<T, F>(page_size: usize, mut fetch: F) -> RemoteResult<Vec<T>>
where
    F: FnMut(u32) -> RemoteResult<Vec<T>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page)?;
        let done = batch.len() < page_size;
        items.extend(batch);
        if done {
            return Ok(items);
        }
        page += 1;
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> RemoteResult<T> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RefWire {
    #[serde(rename = "ref")]
    name: String,
    object: RefObjectWire,
}

#[derive(Debug, Deserialize)]
struct RefObjectWire {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentWire {
    path: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchWire {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LabelWire {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullWire {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    html_url: String,
    head: BranchWire,
    base: BranchWire,
    #[serde(default)]
    labels: Vec<LabelWire>,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct IssueWire {
    number: u64,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct CommentWire {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct CompareFileWire {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CompareWire {
    #[serde(default)]
    status: String,
    #[serde(default)]
    ahead_by: u64,
    #[serde(default)]
    behind_by: u64,
    #[serde(default)]
    total_commits: u64,
    #[serde(default)]
    files: Vec<CompareFileWire>,
}

#[derive(Debug, Deserialize)]
struct MergeWire {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: String,
}

fn branch_ref_from_wire(wire: RefWire) -> BranchRef {
    BranchRef {
        name: wire
            .name
            .strip_prefix("refs/heads/")
            .unwrap_or(&wire.name)
            .to_string(),
        sha: wire.object.sha,
    }
}

fn pull_request_from_wire(wire: PullWire) -> PullRequest {
    PullRequest {
        number: wire.number,
        title: wire.title,
        url: wire.html_url,
        head_ref: wire.head.name,
        base_ref: wire.base.name,
        labels: wire.labels.into_iter().map(|l| l.name).collect(),
        draft: wire.draft,
    }
}

fn comparison_from_wire(wire: CompareWire) -> Comparison {
    Comparison {
        status: wire.status,
        ahead_by: wire.ahead_by,
        behind_by: wire.behind_by,
        total_commits: wire.total_commits,
        files: wire.files.into_iter().map(|f| f.filename).collect(),
    }
}

/// The contents endpoint returns an object for a file and an array for a directory.
fn content_meta_from_value(path: &str, value: Value) -> RemoteResult<ContentMeta> {
    if value.is_array() {
        return Err(RemoteError::Decode(format!(
            "'{}' is a directory on the remote branch",
            path
        )));
    }
    let wire: ContentWire = decode(value)?;
    Ok(ContentMeta {
        path: wire.path,
        sha: wire.sha,
    })
}

// ============================================================================
// RemoteRepository
// ============================================================================

impl RemoteRepository for GitHubClient {
    fn slug(&self) -> &RepoSlug {
        &self.slug
    }

    fn get_branch_ref(&self, branch: &str) -> RemoteResult<BranchRef> {
        let url = self.repo_url(&format!("git/ref/heads/{}", branch))?;
        let wire: RefWire = self.get(url)?;
        Ok(branch_ref_from_wire(wire))
    }

    fn create_branch_ref(&self, branch: &str, sha: &str) -> RemoteResult<BranchRef> {
        let url = self.repo_url("git/refs")?;
        let body = json!({ "ref": format!("refs/heads/{}", branch), "sha": sha });
        let wire: RefWire = self.send(Method::POST, url, &body)?;
        Ok(branch_ref_from_wire(wire))
    }

    fn get_content(&self, branch: &str, path: &str) -> RemoteResult<Option<ContentMeta>> {
        let mut url = self.repo_url(&format!("contents/{}", path))?;
        url.query_pairs_mut().append_pair("ref", branch);
        match self.get::<Value>(url) {
            Ok(value) => content_meta_from_value(path, value).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put_content(&self, update: &ContentUpdate<'_>) -> RemoteResult<()> {
        let url = self.repo_url(&format!("contents/{}", update.path))?;
        let mut body = json!({
            "message": update.message,
            "content": STANDARD.encode(update.content),
            "branch": update.branch,
        });
        if let Some(sha) = update.sha {
            body["sha"] = Value::String(sha.to_string());
        }
        let _: Value = self.send(Method::PUT, url, &body)?;
        Ok(())
    }

    fn create_pull_request(&self, request: &NewPullRequest) -> RemoteResult<RemoteRequest> {
        let url = self.repo_url("pulls")?;
        let body = json!({
            "title": request.title,
            "head": request.head,
            "base": request.base,
            "body": request.body,
            "draft": request.draft,
        });
        let wire: PullWire = self.send(Method::POST, url, &body)?;
        Ok(pull_request_from_wire(wire).as_request())
    }

    fn create_issue(&self, issue: &NewIssue) -> RemoteResult<RemoteRequest> {
        let url = self.repo_url("issues")?;
        let body = json!({
            "title": issue.title,
            "body": issue.body,
            "labels": issue.labels,
        });
        let wire: IssueWire = self.send(Method::POST, url, &body)?;
        Ok(RemoteRequest {
            kind: RequestKind::Issue,
            number: wire.number,
            url: wire.html_url,
            branch: None,
        })
    }

    fn list_open_pull_requests(&self, base: &str) -> RemoteResult<Vec<PullRequest>> {
        let mut url = self.repo_url("pulls")?;
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("base", base);
        let wires: Vec<PullWire> = self.get_all(url)?;
        Ok(wires.into_iter().map(pull_request_from_wire).collect())
    }

    fn find_open_pull_request(&self, branch: &str) -> RemoteResult<Option<PullRequest>> {
        let mut url = self.repo_url("pulls")?;
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("head", &format!("{}:{}", self.slug.owner, branch));
        let wires: Vec<PullWire> = self.get(url)?;
        Ok(wires.into_iter().next().map(pull_request_from_wire))
    }

    fn add_labels(&self, number: u64, labels: &[String]) -> RemoteResult<()> {
        let url = self.repo_url(&format!("issues/{}/labels", number))?;
        let _: Value = self.send(Method::POST, url, &json!({ "labels": labels }))?;
        Ok(())
    }

    fn post_comment(&self, number: u64, body: &str) -> RemoteResult<()> {
        let url = self.repo_url(&format!("issues/{}/comments", number))?;
        let _: Value = self.send(Method::POST, url, &json!({ "body": body }))?;
        Ok(())
    }

    fn list_comments(&self, number: u64) -> RemoteResult<Vec<String>> {
        let url = self.repo_url(&format!("issues/{}/comments", number))?;
        let wires: Vec<CommentWire> = self.get_all(url)?;
        Ok(wires.into_iter().map(|c| c.body).collect())
    }

    fn compare(&self, base: &str, head: &str) -> RemoteResult<Comparison> {
        let url = self.repo_url(&format!("compare/{}...{}", base, head))?;
        let wire: CompareWire = self.get(url)?;
        Ok(comparison_from_wire(wire))
    }

    fn merge_pull_request(
        &self,
        number: u64,
        strategy: MergeStrategy,
    ) -> RemoteResult<MergeOutcome> {
        let url = self.repo_url(&format!("pulls/{}/merge", number))?;
        let body = json!({ "merge_method": strategy.as_api_str() });
        let wire: MergeWire = self.send(Method::PUT, url, &body)?;
        if !wire.merged {
            return Err(RemoteError::Http {
                status: 405,
                message: if wire.message.is_empty() {
                    "pull request was not merged".to_string()
                } else {
                    wire.message
                },
            });
        }
        Ok(MergeOutcome {
            sha: wire.sha,
            message: wire.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(api_base_url: &str) -> GitHubClient {
        let config = Config {
            api_base_url: api_base_url.to_string(),
            ..Config::default()
        };
        GitHubClient::new(
            RepoSlug::parse("octo/widgets").unwrap(),
            SecretString::from("token".to_string()),
            &config,
        )
        .unwrap()
    }

    #[test]
    fn repo_url_escapes_segments_but_keeps_slashes() {
        let client = test_client("https://api.github.com");
        let url = client.repo_url("contents/docs/my notes.md").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/widgets/contents/docs/my%20notes.md"
        );
    }

    #[test]
    fn repo_url_supports_enterprise_prefix() {
        let client = test_client("https://ghe.example.com/api/v3/");
        let url = client.repo_url("git/ref/heads/feature/x").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/widgets/git/ref/heads/feature/x"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = Config {
            api_base_url: "not a url".to_string(),
            ..Config::default()
        };
        let result = GitHubClient::new(
            RepoSlug::parse("octo/widgets").unwrap(),
            SecretString::from("token".to_string()),
            &config,
        );
        assert!(matches!(result, Err(RemoteError::Decode(_))));
    }

    #[test]
    fn branch_ref_strips_heads_prefix() {
        let wire: RefWire = serde_json::from_str(
            r#"{"ref":"refs/heads/task-1","object":{"sha":"abc123","type":"commit"}}"#,
        )
        .unwrap();
        let branch = branch_ref_from_wire(wire);
        assert_eq!(branch.name, "task-1");
        assert_eq!(branch.sha, "abc123");
    }

    #[test]
    fn pull_request_normalizes_labels_and_refs() {
        let wire: PullWire = serde_json::from_str(
            r#"{
                "number": 7,
                "title": "[baton] add logging",
                "html_url": "https://github.com/octo/widgets/pull/7",
                "head": {"ref": "task-1700000000", "sha": "h"},
                "base": {"ref": "main", "sha": "b"},
                "labels": [{"name": "baton"}, {"name": "automation"}],
                "draft": false,
                "state": "open"
            }"#,
        )
        .unwrap();
        let pr = pull_request_from_wire(wire);
        assert_eq!(pr.number, 7);
        assert_eq!(pr.head_ref, "task-1700000000");
        assert_eq!(pr.base_ref, "main");
        assert!(pr.has_label("baton"));
        assert_eq!(pr.as_request().branch.as_deref(), Some("task-1700000000"));
    }

    #[test]
    fn comparison_tolerates_missing_file_list() {
        let wire: CompareWire =
            serde_json::from_str(r#"{"status":"ahead","ahead_by":2,"behind_by":0,"total_commits":2}"#)
                .unwrap();
        let cmp = comparison_from_wire(wire);
        assert_eq!(cmp.ahead_by, 2);
        assert!(cmp.files.is_empty());
    }

    #[test]
    fn collect_pages_follows_full_pages() {
        let mut requested = Vec::new();
        let items = collect_pages(3, |page| {
            requested.push(page);
            Ok(match page {
                1 => vec![1, 2, 3],
                2 => vec![4, 5, 6],
                _ => vec![7],
            })
        })
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(requested, vec![1, 2, 3]);
    }

    #[test]
    fn collect_pages_stops_on_empty_page() {
        let mut calls = 0;
        let items: Vec<u32> = collect_pages(2, |page| {
            calls += 1;
            Ok(if page == 1 { vec![1, 2] } else { Vec::new() })
        })
        .unwrap();

        assert_eq!(items, vec![1, 2]);
        assert_eq!(calls, 2);
    }

    #[test]
    fn collect_pages_propagates_errors() {
        let result: RemoteResult<Vec<u32>> = collect_pages(1, |page| {
            if page == 1 {
                Ok(vec![1])
            } else {
                Err(RemoteError::Transport("reset".to_string()))
            }
        });

        assert!(matches!(result, Err(RemoteError::Transport(_))));
    }

    #[test]
    fn directory_content_is_a_decode_error() {
        let value = serde_json::json!([{"path": "src/a.rs", "sha": "x"}]);
        let err = content_meta_from_value("src", value).unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[test]
    fn file_content_yields_revision_marker() {
        let value = serde_json::json!({"path": "src/a.rs", "sha": "blob1", "type": "file"});
        let meta = content_meta_from_value("src/a.rs", value).unwrap();
        assert_eq!(meta.sha, "blob1");
    }
}
