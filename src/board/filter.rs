//! Author and label filters

use super::correlate::Correlated;
use super::window::Window;
use crate::error::{BoardError, Result};
use crate::model::User;
use std::collections::BTreeSet;

/// Distinct authors of the window commits, ordered by email.
///
/// Taken before correlation, so authors whose commits have no trunk pull
/// request still show up.
pub fn window_authors<'a>(window: &Window<'a>) -> BTreeSet<&'a User> {
    window.commits.iter().map(|c| &c.author).collect()
}

/// Find the author with the given email.
pub fn resolve_author<'a>(authors: &BTreeSet<&'a User>, email: &str) -> Result<&'a User> {
    authors
        .iter()
        .copied()
        .find(|a| a.email == email)
        .ok_or_else(|| BoardError::UnknownAuthor(email.to_string()))
}

/// Find `label` in the label vocabulary.
pub fn resolve_label<'a>(labels: &BTreeSet<&'a str>, label: &str) -> Result<&'a str> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| BoardError::UnknownLabel(label.to_string()))
}

/// Keep rows written by `author`.
pub fn by_author(rows: &mut Vec<Correlated<'_>>, author: &User) {
    rows.retain(|r| &r.commit.author == author);
}

/// Keep rows whose trunk pull request carries `label`.
pub fn by_label(rows: &mut Vec<Correlated<'_>>, label: &str) {
    rows.retain(|r| r.trunk_pr.has_label(label));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{correlate, window};
    use crate::model::{Commit, PullRequest, Repo, Sha};

    fn repo() -> Repo {
        let ann = User::new("Ann", "ann@example.com");
        let bob = User::new("Bob", "bob@example.com");
        let mut repo = Repo::new("o", "r", 1);
        repo.release_branches = vec!["release-1".into()];
        repo.trunk_commits = vec![
            Commit::new(Sha::new("c4"), bob.clone(), "four"),
            Commit::new(Sha::new("c3"), ann.clone(), "three"),
            Commit::new(Sha::new("c2"), bob, "two"),
            Commit::new(Sha::new("c1"), ann, "one"),
            Commit::new(Sha::new("c0"), User::new("Old", "old@example.com"), "zero"),
        ];
        repo.merge_bases.insert("release-1".into(), Sha::new("c1"));
        for (sha, n, labels) in [
            ("c4", 4, vec!["docs"]),
            ("c3", 3, vec!["backport", "bug"]),
            ("c2", 2, vec![]),
            ("c1", 1, vec!["backport"]),
            ("c0", 9, vec!["ancient"]),
        ] {
            repo.trunk_prs.insert(Sha::new(sha), n);
            repo.pulls
                .insert(n, PullRequest::new(n, "t", "master").with_labels(labels));
        }
        repo
    }

    fn shas(rows: &[Correlated<'_>]) -> Vec<String> {
        rows.iter().map(|r| r.commit.sha.to_string()).collect()
    }

    #[test]
    fn test_window_authors_sorted_and_scoped() {
        let repo = repo();
        let w = window::select(&repo, "release-1").unwrap();
        let emails: Vec<&str> = window_authors(&w).iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["ann@example.com", "bob@example.com"]);
    }

    #[test]
    fn test_unknown_author() {
        let repo = repo();
        let w = window::select(&repo, "release-1").unwrap();
        let authors = window_authors(&w);
        assert_eq!(
            resolve_author(&authors, "old@example.com").unwrap_err(),
            BoardError::UnknownAuthor("old@example.com".into())
        );
    }

    #[test]
    fn test_author_filter_preserves_order() {
        let repo = repo();
        let w = window::select(&repo, "release-1").unwrap();
        let authors = window_authors(&w);
        let ann = resolve_author(&authors, "ann@example.com").unwrap();
        let mut rows = correlate::correlate(&repo, &w);
        by_author(&mut rows, ann);
        assert_eq!(shas(&rows), vec!["c3", "c1"]);
    }

    #[test]
    fn test_label_vocabulary_is_global() {
        let repo = repo();
        let labels = repo.trunk_labels();
        // c0 is outside every window but its label is still known.
        assert_eq!(resolve_label(&labels, "ancient").unwrap(), "ancient");
        assert_eq!(
            resolve_label(&labels, "wontfix").unwrap_err(),
            BoardError::UnknownLabel("wontfix".into())
        );
    }

    #[test]
    fn test_label_filter() {
        let repo = repo();
        let w = window::select(&repo, "release-1").unwrap();
        let mut rows = correlate::correlate(&repo, &w);
        by_label(&mut rows, "backport");
        assert_eq!(shas(&rows), vec!["c3", "c1"]);
    }

    #[test]
    fn test_filters_commute() {
        let repo = repo();
        let w = window::select(&repo, "release-1").unwrap();
        let authors = window_authors(&w);
        let bob = resolve_author(&authors, "bob@example.com").unwrap();

        let mut a = correlate::correlate(&repo, &w);
        by_author(&mut a, bob);
        by_label(&mut a, "docs");

        let mut b = correlate::correlate(&repo, &w);
        by_label(&mut b, "docs");
        by_author(&mut b, bob);

        assert_eq!(shas(&a), shas(&b));
        assert_eq!(shas(&a), vec!["c4"]);
    }
}
