//! Ingestion: building repository snapshots
//!
//! The board never talks to git or GitHub itself. An [`Ingest`] builds a
//! complete new set of [`Repo`]s and the caller swaps it into the registry.

pub mod git;

use crate::config::{ConfigError, RepoConfig};
use crate::github::{GitHubClient, GitHubError};
use crate::model::{BranchCommits, Repo, Sha};
use crate::registry::Shutdown;
use crate::snapshot::{Snapshot, SnapshotError};
use git::{Batch, Git, Line, RawCommit};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Error type for ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no repositories configured; add a [[repos]] entry to .backboard/config.toml")]
    NoRepositories,
    #[error("ingestion cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// A source of complete repository snapshots
pub trait Ingest: Send + Sync {
    /// Build every tracked repository from scratch.
    ///
    /// Must return [`IngestError::Cancelled`] promptly once `shutdown` fires.
    fn ingest(&self, shutdown: &Shutdown) -> Result<Vec<Repo>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

fn check_cancelled(shutdown: &Shutdown) -> Result<()> {
    if shutdown.is_triggered() {
        return Err(IngestError::Cancelled);
    }
    Ok(())
}

// ============================================================================
// Snapshot files
// ============================================================================

/// Re-reads a snapshot file written by `backboard sync --output`
#[derive(Debug, Clone)]
pub struct SnapshotIngestor {
    path: PathBuf,
}

impl SnapshotIngestor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Ingest for SnapshotIngestor {
    fn ingest(&self, shutdown: &Shutdown) -> Result<Vec<Repo>> {
        check_cancelled(shutdown)?;
        let snapshot = Snapshot::load(&self.path)?;
        debug!(path = %self.path.display(), generated_at = %snapshot.generated_at, "loaded snapshot");
        Ok(snapshot.repos)
    }

    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }
}

// ============================================================================
// git + GitHub
// ============================================================================

/// Walks local clones with `git` and fetches pull requests with `gh`
#[derive(Debug, Clone)]
pub struct GitIngestor {
    repos: Vec<RepoConfig>,
    token: Option<String>,
}

impl GitIngestor {
    pub fn new(repos: Vec<RepoConfig>, token: Option<String>) -> Self {
        Self { repos, token }
    }

    /// Token taken from `BACKBOARD_GITHUB_TOKEN`, if set
    pub fn from_env(repos: Vec<RepoConfig>) -> Self {
        let token = std::env::var("BACKBOARD_GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        Self::new(repos, token)
    }
}

impl Ingest for GitIngestor {
    fn ingest(&self, shutdown: &Shutdown) -> Result<Vec<Repo>> {
        if self.repos.is_empty() {
            return Err(IngestError::NoRepositories);
        }
        require_auth(self.token.as_deref(), GitHubClient::check_auth)?;
        let mut repos = Vec::with_capacity(self.repos.len());
        for config in &self.repos {
            check_cancelled(shutdown)?;
            let gh = GitHubClient::new(&config.owner, &config.name, self.token.clone());
            repos.push(sync_repo(config, &gh, shutdown)?);
        }
        Ok(repos)
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.repos.iter().map(RepoConfig::full_name).collect();
        format!("git+github {}", names.join(", "))
    }
}

/// Fail before touching any clone when `gh` has no credentials to use.
fn require_auth(
    token: Option<&str>,
    logged_in: impl FnOnce() -> crate::github::Result<bool>,
) -> Result<()> {
    if token.is_some() || logged_in()? {
        return Ok(());
    }
    Err(GitHubError::NotAuthenticated.into())
}

fn sync_repo(config: &RepoConfig, gh: &GitHubClient, shutdown: &Shutdown) -> Result<Repo> {
    let started = Instant::now();
    let git = Git::new(&config.path);
    let remote_ref = |branch: &str| format!("{}/{}", config.remote, branch);

    if config.fetch {
        debug!(repo = %config.full_name(), remote = %config.remote, "fetching");
        git.fetch(&config.remote)?;
    }

    let pattern = config.release_pattern()?;
    let mut release_branches: Vec<String> = git
        .remote_branches(&config.remote)?
        .into_iter()
        .filter(|b| pattern.is_match(b))
        .collect();
    git::sort_release_branches(&mut release_branches);

    let trunk_ref = remote_ref(&config.trunk);
    let mut raw_bases: BTreeMap<String, String> = BTreeMap::new();
    for branch in &release_branches {
        raw_bases.insert(branch.clone(), git.merge_base(&trunk_ref, &remote_ref(branch))?);
    }
    let tags = git.tags()?;

    // Nothing older than the oldest merge base can show up on a board.
    let oldest = match raw_bases.len() {
        0 => None,
        _ => Some(git.oldest_merge_base(&raw_bases.values().cloned().collect::<Vec<_>>())?),
    };
    let trunk_log = git.log(&trunk_ref, oldest.as_deref(), None)?;
    let trunk = git::walk_line(&trunk_log, &tags);
    let merge_bases: HashMap<String, Sha> = raw_bases
        .iter()
        .map(|(branch, mb)| (branch.clone(), window_start(&trunk_log, mb)))
        .collect();
    debug!(repo = %config.full_name(), commits = trunk.commits.len(), "walked trunk");

    let mut branches: Vec<(String, Line)> = Vec::with_capacity(raw_bases.len());
    for (branch, mb) in &raw_bases {
        check_cancelled(shutdown)?;
        let log = git.log(&remote_ref(branch), None, Some(mb.as_str()))?;
        let line = git::walk_line(&log, &tags);
        debug!(repo = %config.full_name(), %branch, commits = line.commits.len(), "walked branch");
        branches.push((branch.clone(), line));
    }

    check_cancelled(shutdown)?;
    let numbers = referenced_numbers(std::iter::once(&trunk).chain(branches.iter().map(|(_, l)| l)));
    let pulls = gh.pulls(&numbers.into_iter().collect::<Vec<_>>())?;

    let trunk_prs = attribute(&trunk, gh, shutdown)?;
    let mut branch_prs: HashMap<_, BTreeMap<String, u64>> = HashMap::new();
    let mut branch_commits = HashMap::new();
    for (branch, line) in branches {
        {
            let message_ids: HashMap<&Sha, _> =
                line.commits.iter().map(|c| (&c.sha, &c.message_id)).collect();
            for (sha, number) in attribute(&line, gh, shutdown)? {
                if let Some(&id) = message_ids.get(&sha) {
                    branch_prs
                        .entry(id.clone())
                        .or_default()
                        .insert(branch.clone(), number);
                }
            }
        }
        branch_commits.insert(branch, BranchCommits::new(line.commits));
    }

    let repo = Repo {
        owner: config.owner.clone(),
        name: config.name.clone(),
        id: gh.repo_id()?,
        trunk: config.trunk.clone(),
        release_branches,
        trunk_commits: trunk.commits,
        merge_bases,
        trunk_prs,
        branch_prs,
        pulls,
        branch_commits,
    };
    info!(
        repo = %repo.full_name(),
        branches = repo.release_branches.len(),
        trunk_commits = repo.trunk_commits.len(),
        pulls = repo.pulls.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "synced repository"
    );
    Ok(repo)
}

/// Every pull request number a line mentions
fn referenced_numbers<'a>(lines: impl Iterator<Item = &'a Line>) -> BTreeSet<u64> {
    let mut numbers = BTreeSet::new();
    for line in lines {
        numbers.extend(line.attributed.values().copied());
        for batch in &line.batches {
            numbers.extend(batch.numbers.iter().copied());
        }
    }
    numbers
}

/// Commit → pull request for a whole line, resolving batches through GitHub.
fn attribute(line: &Line, gh: &GitHubClient, shutdown: &Shutdown) -> Result<HashMap<Sha, u64>> {
    let mut prs = line.attributed.clone();
    for batch in &line.batches {
        check_cancelled(shutdown)?;
        let mut commits_by_pr = HashMap::new();
        for &number in &batch.numbers {
            let shas: HashSet<String> = gh.pull_commits(number)?.into_iter().collect();
            commits_by_pr.insert(number, shas);
        }
        prs.extend(assign_batch(batch, &commits_by_pr));
    }
    Ok(prs)
}

/// Split a batch between its pull requests. Commits no pull request claims
/// (rewritten during the merge) go to the first one.
fn assign_batch(batch: &Batch, commits_by_pr: &HashMap<u64, HashSet<String>>) -> Vec<(Sha, u64)> {
    let Some(&fallback) = batch.numbers.first() else {
        return Vec::new();
    };
    batch
        .commits
        .iter()
        .map(|sha| {
            let number = batch
                .numbers
                .iter()
                .copied()
                .find(|n| commits_by_pr.get(n).is_some_and(|s| s.contains(sha.as_str())))
                .unwrap_or(fallback);
            (sha.clone(), number)
        })
        .collect()
}

/// Where a branch's window ends on the trunk timeline.
///
/// The timeline holds no merge commits, so a merge base that is a merge is
/// replaced by the newest non-merge commit it reaches, or failing that by the
/// closest non-merge commit listed before it. A merge base with neither keeps
/// its own sha, which selects an empty window.
fn window_start(trunk_log: &[RawCommit], merge_base: &str) -> Sha {
    let Some(idx) = trunk_log.iter().position(|c| c.sha == merge_base) else {
        return Sha::new(merge_base);
    };
    let reachable = ancestors(trunk_log, merge_base);
    let older = trunk_log[idx..]
        .iter()
        .find(|c| !c.is_merge() && reachable.contains(c.sha.as_str()));
    let newer = || trunk_log[..idx].iter().rev().find(|c| !c.is_merge());
    older
        .or_else(newer)
        .map(|c| Sha::new(c.sha.clone()))
        .unwrap_or_else(|| Sha::new(merge_base))
}

/// `sha` and every commit of the log reachable from it through parents
fn ancestors<'a>(log: &'a [RawCommit], sha: &'a str) -> HashSet<&'a str> {
    let by_sha: HashMap<&str, &RawCommit> = log.iter().map(|c| (c.sha.as_str(), c)).collect();
    let mut seen = HashSet::new();
    let mut stack = vec![sha];
    while let Some(sha) = stack.pop() {
        if !seen.insert(sha) {
            continue;
        }
        if let Some(commit) = by_sha.get(sha) {
            stack.extend(commit.parents.iter().map(String::as_str));
        }
    }
    seen
}
