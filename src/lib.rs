//! Backboard - Backport tracking for release branches
//!
//! Shows, per release branch, which trunk changes have been ported and which
//! are still waiting.
//!
//! # Overview
//!
//! Ingestion walks local clones and fetches pull request metadata, producing
//! one immutable [`Repo`] per tracked repository. The board pipeline then
//! correlates trunk commits with their porting pull requests for one branch:
//!
//! window → correlate → filter → group → assemble
//!
//! # Backport Status
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `confirmed` | Porting pull request merged, or the change is on the branch |
//! | `pending` | Porting pull request open |
//! | `none` | Nothing ported yet |
//!
//! # Quick Start
//!
//! ```no_run
//! use backboard::{board, BoardQuery, Snapshot};
//! use std::path::Path;
//!
//! let snapshot = Snapshot::load(Path::new("board.snapshot.json")).unwrap();
//! let view = board::build(&snapshot.repos, &BoardQuery::branch("release-23.1"), None).unwrap();
//! println!("{} commits on {}", view.rows.len(), view.branch);
//! ```

pub mod board;
pub mod config;
pub mod error;
pub mod github;
pub mod ingest;
pub mod model;
pub mod refresh;
pub mod registry;
pub mod report;
pub mod serve;
pub mod snapshot;

pub use board::{BackportStatus, BoardQuery, BoardRow, BoardView, RepoSummary};
pub use config::Config;
pub use error::BoardError;
pub use ingest::{GitIngestor, Ingest, IngestError, SnapshotIngestor};
pub use model::{BranchCommits, Commit, MessageId, PullRequest, Repo, Sha, User};
pub use registry::{Registry, Shutdown};
pub use snapshot::Snapshot;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Core types are reachable from the crate root
        let _ = BoardQuery::default();
        assert_eq!(BackportStatus::Absent.as_str(), "none");
    }
}
