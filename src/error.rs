//! Errors raised while building a backport board
//!
//! Every failure here rejects the whole request. There is no partial board.

use thiserror::Error;

/// Failure of one board request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// No repository is being tracked yet.
    #[error("no repositories available")]
    NoRepositories,

    /// The requested repository id is not tracked.
    #[error("repository {0} is not tracked")]
    UnknownRepository(u64),

    /// The requested branch is not a release branch of the repository.
    #[error("{0:?} is not a release branch")]
    UnknownBranch(String),

    /// The author email does not belong to any commit in the branch window.
    #[error("{0:?} is not a recognized author")]
    UnknownAuthor(String),

    /// The label is not used by any trunk pull request.
    #[error("{0:?} is not a recognized label")]
    UnknownLabel(String),

    /// A release branch is listed but ingestion recorded no merge base for it.
    #[error("release branch {0:?} has no recorded merge base")]
    MissingMergeBase(String),
}

impl BoardError {
    /// True when the request itself was wrong, false when the tracked data is
    /// inconsistent.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, BoardError::MissingMergeBase(_) | BoardError::NoRepositories)
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_quote_user_input() {
        assert_eq!(
            BoardError::UnknownBranch("release-9".into()).to_string(),
            "\"release-9\" is not a release branch"
        );
        assert_eq!(
            BoardError::UnknownLabel("nope".into()).to_string(),
            "\"nope\" is not a recognized label"
        );
    }

    #[test]
    fn test_user_errors() {
        assert!(BoardError::UnknownAuthor("a@b".into()).is_user_error());
        assert!(BoardError::UnknownRepository(7).is_user_error());
        assert!(!BoardError::MissingMergeBase("release-1".into()).is_user_error());
        assert!(!BoardError::NoRepositories.is_user_error());
    }
}
