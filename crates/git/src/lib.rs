//! Git collaborator for branchdiff.
//!
//! Opens a repository, checks that branches exist, and performs an
//! in-memory scratch merge whose result is handed to the core engine as
//! [`FileChange`](branchdiff_core::FileChange) values. The working tree and
//! the branches themselves are never modified.

pub mod client;
pub mod errors;

pub use client::{GitClient, ScratchMerge};
pub use errors::GitError;
