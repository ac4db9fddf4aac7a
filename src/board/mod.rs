//! Backport board pipeline
//!
//! window → correlate → filter → group → assemble
//!
//! Pure functions over a repository snapshot. Callers hold whatever lock
//! protects the snapshot for the duration of [`build`].

pub mod correlate;
pub mod filter;
pub mod group;
pub mod view;
pub mod window;

pub use correlate::BackportStatus;
pub use view::{BoardRow, BoardView, RepoSummary};

use crate::error::{BoardError, Result};
use crate::model::Repo;

/// What a caller asked to see
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardQuery {
    /// Numeric repository id; the first tracked repository when absent
    pub repo: Option<u64>,
    /// Release branch; the default branch when absent
    pub branch: Option<String>,
    /// Author email
    pub author: Option<String>,
    pub label: Option<String>,
}

impl BoardQuery {
    pub fn branch(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Self::default()
        }
    }

    pub fn with_repo(mut self, id: u64) -> Self {
        self.repo = Some(id);
        self
    }

    pub fn with_author(mut self, email: impl Into<String>) -> Self {
        self.author = Some(email.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Pick the requested repository, or the first one.
pub fn select_repo(repos: &[Repo], id: Option<u64>) -> Result<&Repo> {
    match id {
        Some(id) => repos
            .iter()
            .find(|r| r.id == id)
            .ok_or(BoardError::UnknownRepository(id)),
        None => repos.first().ok_or(BoardError::NoRepositories),
    }
}

/// Build the board for `query`.
///
/// `default_branch` applies when the query names no branch; without one the
/// newest release branch is shown.
pub fn build(repos: &[Repo], query: &BoardQuery, default_branch: Option<&str>) -> Result<BoardView> {
    let repo = select_repo(repos, query.repo)?;

    let branch = query
        .branch
        .as_deref()
        .or(default_branch)
        .or(repo.release_branches.first().map(String::as_str))
        .unwrap_or_default();
    let window = window::select(repo, branch)?;

    let authors = filter::window_authors(&window);
    let author = query
        .author
        .as_deref()
        .map(|email| filter::resolve_author(&authors, email))
        .transpose()?;

    let labels = repo.trunk_labels();
    let label = query
        .label
        .as_deref()
        .map(|label| filter::resolve_label(&labels, label))
        .transpose()?;

    let mut rows = correlate::correlate(repo, &window);
    if let Some(author) = author {
        filter::by_author(&mut rows, author);
    }
    if let Some(label) = label {
        filter::by_label(&mut rows, label);
    }

    let keys: Vec<(u64, Option<u64>)> = rows
        .iter()
        .map(|r| (r.trunk_pr.number, r.backport_pr.map(|pr| pr.number)))
        .collect();
    let spans = group::project(&keys);

    Ok(view::assemble(view::Parts {
        repos,
        repo,
        branch: window.branch,
        merge_base: window.merge_base,
        authors,
        author,
        labels,
        label,
        rows,
        spans,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchCommits, Commit, PullRequest, Sha, User};

    /// Branches release-1 and release-2, trunk [c3, c2, c1], c1 from PR #10
    /// labelled "backport" and picked straight onto release-1.
    fn scenario() -> Repo {
        let ann = User::new("Ann", "ann@example.com");
        let bob = User::new("Bob", "bob@example.com");
        let mut repo = Repo::new("cockroachdb", "cockroach", 42);
        repo.release_branches = vec!["release-1".into(), "release-2".into()];
        repo.trunk_commits = vec![
            Commit::new(Sha::new("c3"), ann.clone(), "sql: three"),
            Commit::new(Sha::new("c2"), bob, "kv: two"),
            Commit::new(Sha::new("c1"), ann.clone(), "ui: one"),
        ];
        repo.merge_bases.insert("release-1".into(), Sha::new("c1"));
        repo.merge_bases.insert("release-2".into(), Sha::new("c2"));
        repo.trunk_prs.insert(Sha::new("c3"), 30);
        repo.trunk_prs.insert(Sha::new("c2"), 20);
        repo.trunk_prs.insert(Sha::new("c1"), 10);
        repo.pulls.insert(30, PullRequest::new(30, "three", "master").with_labels(["backport"]));
        repo.pulls.insert(20, PullRequest::new(20, "two", "master"));
        repo.pulls.insert(10, PullRequest::new(10, "one", "master").with_labels(["backport"]));
        repo.branch_commits.insert(
            "release-1".into(),
            BranchCommits::new(vec![Commit::new(Sha::new("b1"), ann, "ui: one")]),
        );
        repo
    }

    fn shas(view: &BoardView) -> Vec<&str> {
        view.rows.iter().map(|r| r.commit.sha.as_str()).collect()
    }

    #[test]
    fn test_direct_port_without_pr_is_confirmed() {
        let repos = vec![scenario()];
        let view = build(&repos, &BoardQuery::branch("release-1"), None).unwrap();
        assert_eq!(shas(&view), vec!["c3", "c2", "c1"]);
        let c1 = &view.rows[2];
        assert_eq!(c1.status, BackportStatus::Confirmed);
        assert!(c1.backport_pr.is_none());
        assert_eq!(view.rows[0].status, BackportStatus::Absent);
    }

    #[test]
    fn test_label_filter_drops_unlabelled_pr() {
        let repos = vec![scenario()];
        let query = BoardQuery::branch("release-1").with_label("backport");
        let view = build(&repos, &query, None).unwrap();
        assert_eq!(shas(&view), vec!["c3", "c1"]);
        assert_eq!(view.label.as_deref(), Some("backport"));
    }

    #[test]
    fn test_default_branch_then_first_release_branch() {
        let repos = vec![scenario()];
        let view = build(&repos, &BoardQuery::default(), Some("release-2")).unwrap();
        assert_eq!(view.branch, "release-2");
        assert_eq!(shas(&view), vec!["c3", "c2"]);

        let view = build(&repos, &BoardQuery::default(), None).unwrap();
        assert_eq!(view.branch, "release-1");
    }

    #[test]
    fn test_repo_selection() {
        let repos = vec![scenario()];
        assert_eq!(
            build(&repos, &BoardQuery::branch("release-1").with_repo(7), None).unwrap_err(),
            BoardError::UnknownRepository(7)
        );
        let view = build(&repos, &BoardQuery::branch("release-1").with_repo(42), None).unwrap();
        assert_eq!(view.repo.full_name, repos[0].full_name());
        assert_eq!(view.repos[0].full_name, repos[0].full_name());
        assert_eq!(
            build(&[], &BoardQuery::branch("release-1"), None).unwrap_err(),
            BoardError::NoRepositories
        );
    }

    #[test]
    fn test_errors_short_circuit() {
        let repos = vec![scenario()];
        assert_eq!(
            build(&repos, &BoardQuery::branch("master"), None).unwrap_err(),
            BoardError::UnknownBranch("master".into())
        );
        assert_eq!(
            build(&repos, &BoardQuery::branch("release-1").with_author("x@y"), None).unwrap_err(),
            BoardError::UnknownAuthor("x@y".into())
        );
        assert_eq!(
            build(&repos, &BoardQuery::branch("release-1").with_label("nope"), None).unwrap_err(),
            BoardError::UnknownLabel("nope".into())
        );
    }

    #[test]
    fn test_vocabularies_and_index() {
        let repos = vec![scenario()];
        let query = BoardQuery::branch("release-1").with_author("ann@example.com");
        let view = build(&repos, &query, None).unwrap();
        let emails: Vec<&str> = view.authors.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["ann@example.com", "bob@example.com"]);
        assert_eq!(view.labels, vec!["backport"]);
        assert_eq!(shas(&view), vec!["c3", "c1"]);
        assert_eq!(view.trunk_pr_commits.get(&10), Some(&vec![Sha::new("c1")]));
        assert!(!view.trunk_pr_commits.contains_key(&20));
    }

    #[test]
    fn test_spans_in_view() {
        let mut repo = scenario();
        // c3 and c2 both come from PR #30.
        repo.trunk_prs.insert(Sha::new("c2"), 30);
        let repos = vec![repo];
        let view = build(&repos, &BoardQuery::branch("release-1"), None).unwrap();
        let spans: Vec<(usize, usize)> = view
            .rows
            .iter()
            .map(|r| (r.trunk_pr_span, r.backport_pr_span))
            .collect();
        assert_eq!(spans, vec![(2, 1), (0, 1), (1, 1)]);
        assert_eq!(
            view.trunk_pr_commits.get(&30),
            Some(&vec![Sha::new("c3"), Sha::new("c2")])
        );
    }

    #[test]
    fn test_idempotent() {
        let repos = vec![scenario()];
        let query = BoardQuery::branch("release-1").with_label("backport");
        let a = build(&repos, &query, None).unwrap();
        let b = build(&repos, &query, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
