//! Assembled board, ready for rendering

use super::correlate::{BackportStatus, Correlated};
use super::group::Spans;
use crate::model::{Commit, PullRequest, Repo, Sha, User};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    pub id: u64,
    pub owner: String,
    pub name: String,
    /// `owner/name`
    pub full_name: String,
}

impl From<&Repo> for RepoSummary {
    fn from(repo: &Repo) -> Self {
        Self {
            id: repo.id,
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            full_name: repo.full_name(),
        }
    }
}

/// One table row: a trunk commit and its backport state on the viewed branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardRow {
    pub commit: Commit,
    pub status: BackportStatus,
    pub trunk_pr: PullRequest,
    pub backport_pr: Option<PullRequest>,
    pub backportable: bool,
    pub oldest_tags: Vec<String>,
    /// 0 unless this row starts a trunk pull request group
    pub trunk_pr_span: usize,
    /// 0 unless this row starts a backport pull request group
    pub backport_pr_span: usize,
}

/// Everything a renderer needs for one board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    pub repos: Vec<RepoSummary>,
    pub repo: RepoSummary,
    pub branches: Vec<String>,
    pub branch: String,
    pub merge_base: Sha,
    /// Authors of the branch window, by email
    pub authors: Vec<User>,
    pub author: Option<User>,
    /// Labels of all trunk pull requests
    pub labels: Vec<String>,
    pub label: Option<String>,
    pub rows: Vec<BoardRow>,
    /// Trunk pull request → shas of its rows, in row order
    pub trunk_pr_commits: BTreeMap<u64, Vec<Sha>>,
}

impl BoardView {
    pub fn count(&self, status: BackportStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }
}

/// Inputs to [`assemble`], gathered by the pipeline
pub struct Parts<'a> {
    pub repos: &'a [Repo],
    pub repo: &'a Repo,
    pub branch: &'a str,
    pub merge_base: &'a Sha,
    pub authors: BTreeSet<&'a User>,
    pub author: Option<&'a User>,
    pub labels: BTreeSet<&'a str>,
    pub label: Option<&'a str>,
    pub rows: Vec<Correlated<'a>>,
    pub spans: Vec<Spans>,
}

/// Package the pipeline output into an owned, immutable view.
pub fn assemble(parts: Parts<'_>) -> BoardView {
    let mut trunk_pr_commits: BTreeMap<u64, Vec<Sha>> = BTreeMap::new();
    let rows: Vec<BoardRow> = parts
        .rows
        .into_iter()
        .zip(parts.spans)
        .map(|(row, spans)| {
            trunk_pr_commits
                .entry(row.trunk_pr.number)
                .or_default()
                .push(row.commit.sha.clone());
            BoardRow {
                commit: row.commit.clone(),
                status: row.status,
                trunk_pr: row.trunk_pr.clone(),
                backport_pr: row.backport_pr.cloned(),
                backportable: row.backportable,
                oldest_tags: row.oldest_tags,
                trunk_pr_span: spans.trunk_pr,
                backport_pr_span: spans.backport_pr,
            }
        })
        .collect();

    BoardView {
        repos: parts.repos.iter().map(RepoSummary::from).collect(),
        repo: RepoSummary::from(parts.repo),
        branches: parts.repo.release_branches.clone(),
        branch: parts.branch.to_string(),
        merge_base: parts.merge_base.clone(),
        authors: parts.authors.into_iter().cloned().collect(),
        author: parts.author.cloned(),
        labels: parts.labels.into_iter().map(str::to_string).collect(),
        label: parts.label.map(str::to_string),
        rows,
        trunk_pr_commits,
    }
}
