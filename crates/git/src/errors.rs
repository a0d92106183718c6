//! Error type for repository access.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A branch or revision could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),
}
