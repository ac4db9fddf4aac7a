//! Branch window selection
//!
//! Trunk commits older than a branch's merge base can never be backported to
//! it, so every board starts by cutting the trunk timeline at that point.

use crate::error::{BoardError, Result};
use crate::model::{Commit, Repo, Sha};

/// The part of trunk history relevant to one release branch
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub branch: &'a str,
    pub merge_base: &'a Sha,
    /// Newest first, ending with the merge base
    pub commits: &'a [Commit],
}

/// Select the window for `branch`.
pub fn select<'a>(repo: &'a Repo, branch: &str) -> Result<Window<'a>> {
    let branch = repo
        .release_branches
        .iter()
        .find(|b| b.as_str() == branch)
        .ok_or_else(|| BoardError::UnknownBranch(branch.to_string()))?;
    let merge_base = repo
        .merge_bases
        .get(branch)
        .ok_or_else(|| BoardError::MissingMergeBase(branch.clone()))?;

    Ok(Window {
        branch,
        merge_base,
        commits: truncate(&repo.trunk_commits, merge_base),
    })
}

/// Commits from the newest down to and including `sha`.
///
/// A timeline that does not contain `sha` gives an empty window.
pub fn truncate<'a>(timeline: &'a [Commit], sha: &Sha) -> &'a [Commit] {
    match timeline.iter().position(|c| &c.sha == sha) {
        Some(i) => &timeline[..=i],
        None => &[],
    }
}
