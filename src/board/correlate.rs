//! Correlation of trunk commits with their pull requests and backports

use super::window::Window;
use crate::model::{Commit, PullRequest, Repo};
use serde::Serialize;

/// Whether a trunk change has landed on the branch being viewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackportStatus {
    /// The porting pull request merged, or the change is on the branch anyway
    Confirmed,
    /// A porting pull request is open
    Pending,
    #[serde(rename = "none")]
    Absent,
}

impl BackportStatus {
    /// Derive the status from the two independent signals.
    ///
    /// A change found directly in the branch history counts as landed even
    /// when no porting pull request was tracked (manual or squashed ports).
    pub fn resolve(backport_pr: Option<&PullRequest>, on_branch: bool) -> Self {
        if on_branch {
            return BackportStatus::Confirmed;
        }
        match backport_pr {
            Some(pr) if pr.is_merged() => BackportStatus::Confirmed,
            Some(_) => BackportStatus::Pending,
            None => BackportStatus::Absent,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            BackportStatus::Confirmed => "✓",
            BackportStatus::Pending => "◷",
            BackportStatus::Absent => "",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackportStatus::Confirmed => "confirmed",
            BackportStatus::Pending => "pending",
            BackportStatus::Absent => "none",
        }
    }
}

/// A window commit with everything known about its backport
#[derive(Debug, Clone)]
pub struct Correlated<'a> {
    pub commit: &'a Commit,
    pub trunk_pr: &'a PullRequest,
    pub backport_pr: Option<&'a PullRequest>,
    pub status: BackportStatus,
    /// No porting pull request exists yet. A direct port does not clear this.
    pub backportable: bool,
    pub oldest_tags: Vec<String>,
}

/// Correlate every window commit that has a trunk pull request.
///
/// Commits without one are skipped; nothing useful can be said about them.
pub fn correlate<'a>(repo: &'a Repo, window: &Window<'a>) -> Vec<Correlated<'a>> {
    let on_branch = repo.branch(window.branch);

    window
        .commits
        .iter()
        .filter_map(|commit| {
            let trunk_pr = repo.trunk_pr(&commit.sha)?;
            let backport_pr = repo.branch_pr(&commit.message_id, window.branch);
            let landed = on_branch.is_some_and(|b| b.contains(&commit.message_id));

            Some(Correlated {
                commit,
                trunk_pr,
                backport_pr,
                status: BackportStatus::resolve(backport_pr, landed),
                backportable: backport_pr.is_none(),
                oldest_tags: oldest_tags(repo, commit),
            })
        })
        .collect()
}

/// Oldest tags of a change across trunk and every release branch, so a
/// reader can tell whether it has shipped anywhere.
fn oldest_tags(repo: &Repo, commit: &Commit) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: &Option<String>| {
        if let Some(tag) = tag {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    };

    push(&commit.oldest_tag);
    for branch in &repo.release_branches {
        if let Some(ported) = repo.branch(branch).and_then(|b| b.find(&commit.message_id)) {
            push(&ported.oldest_tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::window;
    use crate::model::{BranchCommits, Sha, User};
    use chrono::{TimeZone, Utc};

    fn commit(sha: &str) -> Commit {
        Commit::new(
            Sha::new(sha),
            User::new("Ann", "ann@example.com"),
            &format!("change {sha}"),
        )
    }

    fn repo() -> Repo {
        let mut repo = Repo::new("o", "r", 1);
        repo.release_branches = vec!["release-2".into(), "release-1".into()];
        repo.trunk_commits = vec![commit("c4"), commit("c3"), commit("c2"), commit("c1")];
        repo.merge_bases.insert("release-1".into(), Sha::new("c1"));
        repo.merge_bases.insert("release-2".into(), Sha::new("c1"));
        for (sha, n) in [("c4", 40), ("c3", 30), ("c2", 20), ("c1", 10)] {
            repo.trunk_prs.insert(Sha::new(sha), n);
            repo.pulls.insert(n, PullRequest::new(n, format!("pr {n}"), "master"));
        }
        repo
    }

    fn merged() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn status_of(repo: &Repo, branch: &str, sha: &str) -> BackportStatus {
        let w = window::select(repo, branch).unwrap();
        correlate(repo, &w)
            .into_iter()
            .find(|c| c.commit.sha.as_str() == sha)
            .map(|c| c.status)
            .unwrap()
    }

    #[test]
    fn test_resolve_is_exhaustive() {
        let open = PullRequest::new(1, "t", "release-1");
        let done = open.clone().merged(merged());
        assert_eq!(BackportStatus::resolve(None, false), BackportStatus::Absent);
        assert_eq!(BackportStatus::resolve(Some(&open), false), BackportStatus::Pending);
        assert_eq!(BackportStatus::resolve(Some(&done), false), BackportStatus::Confirmed);
        assert_eq!(BackportStatus::resolve(None, true), BackportStatus::Confirmed);
        assert_eq!(BackportStatus::resolve(Some(&open), true), BackportStatus::Confirmed);
    }

    #[test]
    fn test_markers() {
        assert_eq!(BackportStatus::Confirmed.marker(), "✓");
        assert_eq!(BackportStatus::Pending.marker(), "◷");
        assert_eq!(BackportStatus::Absent.marker(), "");
        assert_eq!(serde_json::to_string(&BackportStatus::Absent).unwrap(), "\"none\"");
    }

    #[test]
    fn test_commit_without_trunk_pr_is_dropped() {
        let mut repo = repo();
        repo.trunk_prs.remove(&Sha::new("c3"));
        let w = window::select(&repo, "release-1").unwrap();
        let shas: Vec<&str> = correlate(&repo, &w)
            .iter()
            .map(|c| c.commit.sha.as_str())
            .collect();
        assert_eq!(shas, vec!["c4", "c2", "c1"]);
    }

    #[test]
    fn test_pending_and_merged_backports() {
        let mut repo = repo();
        let c2 = repo.trunk_commits[2].message_id.clone();
        let c3 = repo.trunk_commits[1].message_id.clone();
        repo.pulls.insert(100, PullRequest::new(100, "backport", "release-1"));
        repo.pulls
            .insert(101, PullRequest::new(101, "backport", "release-1").merged(merged()));
        repo.branch_prs.entry(c2).or_default().insert("release-1".into(), 100);
        repo.branch_prs.entry(c3).or_default().insert("release-1".into(), 101);

        assert_eq!(status_of(&repo, "release-1", "c2"), BackportStatus::Pending);
        assert_eq!(status_of(&repo, "release-1", "c3"), BackportStatus::Confirmed);
        assert_eq!(status_of(&repo, "release-1", "c4"), BackportStatus::Absent);
        // Porting pull requests are per branch.
        assert_eq!(status_of(&repo, "release-2", "c3"), BackportStatus::Absent);
    }

    #[test]
    fn test_direct_port_confirms_but_stays_backportable() {
        let mut repo = repo();
        let picked = Commit::new(
            Sha::new("b1"),
            User::new("Ann", "ann@example.com"),
            "change c2\n\n(cherry picked from commit c2)",
        );
        repo.branch_commits
            .insert("release-1".into(), BranchCommits::new(vec![picked]));

        let w = window::select(&repo, "release-1").unwrap();
        let rows = correlate(&repo, &w);
        let c2 = rows.iter().find(|c| c.commit.sha.as_str() == "c2").unwrap();
        assert_eq!(c2.status, BackportStatus::Confirmed);
        assert!(c2.backport_pr.is_none());
        assert!(c2.backportable);
    }

    #[test]
    fn test_backportable_false_with_porting_pr() {
        let mut repo = repo();
        let c1 = repo.trunk_commits[3].message_id.clone();
        repo.pulls.insert(100, PullRequest::new(100, "backport", "release-1"));
        repo.branch_prs.entry(c1).or_default().insert("release-1".into(), 100);
        let w = window::select(&repo, "release-1").unwrap();
        let rows = correlate(&repo, &w);
        assert!(!rows.last().unwrap().backportable);
        assert!(rows[0].backportable);
    }

    #[test]
    fn test_oldest_tags_across_all_branches() {
        let mut repo = repo();
        repo.trunk_commits[3] = commit("c1").with_oldest_tag("v3.0.0");
        let on = |sha: &str, tag: &str| {
            Commit::new(Sha::new(sha), User::new("Ann", "ann@example.com"), "change c1")
                .with_oldest_tag(tag)
        };
        repo.branch_commits
            .insert("release-2".into(), BranchCommits::new(vec![on("b2", "v2.1.4")]));
        repo.branch_commits
            .insert("release-1".into(), BranchCommits::new(vec![on("b1", "v1.9.9")]));

        // Viewing release-1 still reports the release-2 tag.
        let w = window::select(&repo, "release-1").unwrap();
        let rows = correlate(&repo, &w);
        assert_eq!(rows.last().unwrap().oldest_tags, vec!["v3.0.0", "v2.1.4", "v1.9.9"]);
        assert!(rows[0].oldest_tags.is_empty());
    }
}
