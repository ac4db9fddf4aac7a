//! Repository snapshot model
//!
//! Everything ingestion collects about one tracked repository. Values are
//! immutable once built; a refresh builds a whole new `Repo` and swaps it in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// A full commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(pub String);

impl Sha {
    pub fn new(s: impl Into<String>) -> Self {
        Sha(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in tables
    pub fn short(&self) -> &str {
        self.0.get(..9).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a logical change, stable across cherry-picks and rebases.
///
/// Derived from the commit message only, never from the hash, so a backport
/// commit on a release branch maps back to the trunk commit it was picked from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Hash the normalized message.
    ///
    /// Normalization drops the trailers that tooling appends when porting a
    /// change (`(cherry picked from commit ...)`, `Release justification: ...`),
    /// trailing whitespace on each line and trailing blank lines.
    pub fn from_message(message: &str) -> Self {
        let mut lines: Vec<&str> = message
            .lines()
            .map(str::trim_end)
            .filter(|line| !is_porting_trailer(line))
            .collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        while lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }

        let mut hasher = Sha256::new();
        hasher.update(lines.join("\n").as_bytes());
        MessageId(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_porting_trailer(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("(cherry picked from commit ")
        || trimmed
            .get(..22)
            .is_some_and(|p| p.eq_ignore_ascii_case("release justification:"))
}

// ============================================================================
// Commits, users, pull requests
// ============================================================================

/// Commit author. Keyed by email; equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }
}

/// A non-merge commit on trunk or on a release branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: Sha,
    pub author: User,
    /// First line of the message
    pub title: String,
    pub message_id: MessageId,
    /// Earliest tag on the same line of history that contains this commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_tag: Option<String>,
}

impl Commit {
    /// Build a commit from its raw message, deriving title and identity.
    pub fn new(sha: Sha, author: User, message: &str) -> Self {
        Self {
            sha,
            author,
            title: message.lines().next().unwrap_or_default().trim().to_string(),
            message_id: MessageId::from_message(message),
            oldest_tag: None,
        }
    }

    pub fn with_oldest_tag(mut self, tag: impl Into<String>) -> Self {
        self.oldest_tag = Some(tag.into());
        self
    }
}

/// A GitHub pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    /// Sorted, deduplicated
    pub labels: Vec<String>,
    /// `None` while open or if closed without merging
    pub merged_at: Option<DateTime<Utc>>,
    /// Branch the pull request targets
    pub base: String,
}

impl PullRequest {
    pub fn new(number: u64, title: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            labels: Vec::new(),
            merged_at: None,
            base: base.into(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        self.labels = set.into_iter().collect();
        self
    }

    pub fn merged(mut self, at: DateTime<Utc>) -> Self {
        self.merged_at = Some(at);
        self
    }

    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).is_ok()
    }
}

// ============================================================================
// Branch history
// ============================================================================

/// Commits of one release branch since it diverged from trunk, indexed by
/// logical change identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Commit>", into = "Vec<Commit>")]
pub struct BranchCommits {
    commits: Vec<Commit>,
    message_ids: HashMap<MessageId, usize>,
}

impl BranchCommits {
    pub fn new(commits: Vec<Commit>) -> Self {
        let mut message_ids = HashMap::with_capacity(commits.len());
        for (i, c) in commits.iter().enumerate() {
            // Newest first: keep the newest copy of a change that was picked twice.
            message_ids.entry(c.message_id.clone()).or_insert(i);
        }
        Self {
            commits,
            message_ids,
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.message_ids.contains_key(id)
    }

    /// The branch-local commit carrying the given logical change
    pub fn find(&self, id: &MessageId) -> Option<&Commit> {
        self.message_ids.get(id).map(|&i| &self.commits[i])
    }
}

impl From<Vec<Commit>> for BranchCommits {
    fn from(commits: Vec<Commit>) -> Self {
        Self::new(commits)
    }
}

impl From<BranchCommits> for Vec<Commit> {
    fn from(b: BranchCommits) -> Self {
        b.commits
    }
}

// ============================================================================
// Repository snapshot
// ============================================================================

/// Everything known about one tracked repository at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub owner: String,
    pub name: String,
    /// GitHub's numeric repository id
    pub id: u64,
    pub trunk: String,
    /// Release branches, newest first
    pub release_branches: Vec<String>,
    /// Non-merge trunk commits, newest first
    pub trunk_commits: Vec<Commit>,
    /// Release branch → trunk commit it diverged from
    pub merge_bases: HashMap<String, Sha>,
    /// Trunk commit → number of the pull request that introduced it
    pub trunk_prs: HashMap<Sha, u64>,
    /// Logical change → release branch → number of the pull request porting it
    pub branch_prs: HashMap<MessageId, BTreeMap<String, u64>>,
    pub pulls: BTreeMap<u64, PullRequest>,
    pub branch_commits: HashMap<String, BranchCommits>,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, id: u64) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            id,
            trunk: "master".to_string(),
            ..Self::default()
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Pull request that introduced a trunk commit
    pub fn trunk_pr(&self, sha: &Sha) -> Option<&PullRequest> {
        self.trunk_prs.get(sha).and_then(|n| self.pulls.get(n))
    }

    /// Pull request porting a logical change onto `branch`
    pub fn branch_pr(&self, id: &MessageId, branch: &str) -> Option<&PullRequest> {
        self.branch_prs
            .get(id)
            .and_then(|by_branch| by_branch.get(branch))
            .and_then(|n| self.pulls.get(n))
    }

    pub fn branch(&self, branch: &str) -> Option<&BranchCommits> {
        self.branch_commits.get(branch)
    }

    /// Labels of every pull request that introduced a trunk commit.
    pub fn trunk_labels(&self) -> BTreeSet<&str> {
        let numbers: BTreeSet<u64> = self.trunk_prs.values().copied().collect();
        numbers
            .iter()
            .filter_map(|n| self.pulls.get(n))
            .flat_map(|pr| pr.labels.iter().map(String::as_str))
            .collect()
    }
}
