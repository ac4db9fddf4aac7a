//! GitHub CLI (`gh`) Integration
//!
//! Wrapper around the GitHub CLI for pull request metadata.
//! Uses `gh` instead of direct API calls to avoid token management complexity;
//! `BACKBOARD_GITHUB_TOKEN` is handed to `gh` as `GH_TOKEN` when set.

use crate::model::PullRequest;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::process::Command;
use thiserror::Error;

/// Pull requests fetched per GraphQL query
const BATCH_SIZE: usize = 50;

/// Error type for GitHub operations
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("not authenticated with GitHub. Run 'gh auth login' or set BACKBOARD_GITHUB_TOKEN.")]
    NotAuthenticated,
    #[error("GitHub API rate limit exceeded. Try again later.")]
    RateLimited,
    #[error("failed to parse GitHub response: {message}")]
    ParseError { message: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

/// GitHub client using `gh` CLI
#[derive(Debug, Clone)]
pub struct GitHubClient {
    owner: String,
    name: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct RepoResponse {
    id: u64,
}

/// `issueOrPullRequest` result; issues come back without pull request fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullNode {
    number: Option<u64>,
    title: Option<String>,
    merged_at: Option<DateTime<Utc>>,
    base_ref_name: Option<String>,
    labels: Option<LabelConnection>,
}

#[derive(Debug, Deserialize)]
struct LabelConnection {
    nodes: Vec<LabelNode>,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    repository: Option<HashMap<String, Option<PullNode>>>,
}

impl GitHubClient {
    /// Create a client for `owner/name`
    pub fn new(owner: impl Into<String>, name: impl Into<String>, token: Option<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            token,
        }
    }

    /// Whether `gh auth status` finds a logged-in account
    pub fn check_auth() -> Result<bool> {
        let output = Command::new("gh").args(["auth", "status"]).output()?;
        Ok(output.status.success())
    }

    fn gh(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("gh");
        cmd.args(args);
        if let Some(token) = &self.token {
            cmd.env("GH_TOKEN", token);
        }

        let output = cmd.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if stderr.contains("not logged") || stderr.contains("gh auth login") {
                return Err(GitHubError::NotAuthenticated);
            }
            if stderr.contains("rate limit") {
                return Err(GitHubError::RateLimited);
            }
            return Err(GitHubError::CommandFailed {
                command: format!("gh {}", args.first().copied().unwrap_or_default()),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// GitHub's numeric id for the repository
    pub fn repo_id(&self) -> Result<u64> {
        let path = format!("repos/{}/{}", self.owner, self.name);
        let json = self.gh(&["api", &path])?;
        let resp: RepoResponse = serde_json::from_str(&json).map_err(|e| GitHubError::ParseError {
            message: format!("repository: {}", e),
        })?;
        Ok(resp.id)
    }

    /// Fetch the given pull requests. Numbers that turn out to be issues or
    /// do not exist are left out.
    pub fn pulls(&self, numbers: &[u64]) -> Result<BTreeMap<u64, PullRequest>> {
        let mut pulls = BTreeMap::new();
        for chunk in numbers.chunks(BATCH_SIZE) {
            let query = pulls_query(&self.owner, &self.name, chunk);
            let arg = format!("query={}", query);
            let json = self.gh(&["api", "graphql", "-f", &arg])?;
            pulls.extend(parse_pulls(&json)?.into_iter().map(|pr| (pr.number, pr)));
        }
        Ok(pulls)
    }

    /// Commit shas of one pull request
    pub fn pull_commits(&self, number: u64) -> Result<Vec<String>> {
        let path = format!("repos/{}/{}/pulls/{}/commits?per_page=100", self.owner, self.name, number);
        let out = self.gh(&["api", "--paginate", &path, "--jq", ".[].sha"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

/// GraphQL query fetching a batch of pull requests under `pr<number>` aliases
fn pulls_query(owner: &str, name: &str, numbers: &[u64]) -> String {
    let mut query = format!(
        "query {{ repository(owner: {:?}, name: {:?}) {{",
        owner, name
    );
    for n in numbers {
        query.push_str(&format!(
            " pr{n}: issueOrPullRequest(number: {n}) {{ ... on PullRequest {{ \
             number title mergedAt baseRefName labels(first: 100) {{ nodes {{ name }} }} }} }}"
        ));
    }
    query.push_str(" } }");
    query
}

fn parse_pulls(json: &str) -> Result<Vec<PullRequest>> {
    let resp: GraphQlResponse = serde_json::from_str(json).map_err(|e| GitHubError::ParseError {
        message: format!("JSON parse error: {}", e),
    })?;

    let nodes = resp
        .data
        .and_then(|d| d.repository)
        .ok_or_else(|| GitHubError::ParseError {
            message: "response has no repository".to_string(),
        })?;

    let mut pulls: Vec<PullRequest> = nodes
        .into_values()
        .flatten()
        .filter_map(|node| {
            let number = node.number?;
            let mut pr = PullRequest::new(
                number,
                node.title.unwrap_or_default(),
                node.base_ref_name.unwrap_or_default(),
            )
            .with_labels(
                node.labels
                    .map(|l| l.nodes.into_iter().map(|n| n.name).collect::<Vec<_>>())
                    .unwrap_or_default(),
            );
            pr.merged_at = node.merged_at;
            Some(pr)
        })
        .collect();
    pulls.sort_by_key(|pr| pr.number);
    Ok(pulls)
}
