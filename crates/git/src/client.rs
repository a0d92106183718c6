//! Local repository access via `git2`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use branchdiff_core::{parse_conflict_markers, ConflictRegion, FileChange, FileStatus};
use git2::{Commit, Delta, Index, IndexEntry, MergeOptions, Oid, Repository};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

/// Result of merging one branch into another without touching either.
#[derive(Debug, Clone)]
pub struct ScratchMerge {
    pub from: String,
    pub to: String,
    /// Common ancestor, if the branches share history.
    pub merge_base: Option<String>,
    /// Every path the merge would change on `to`, sorted by path.
    pub changes: Vec<FileChange>,
}

impl ScratchMerge {
    pub fn has_conflicts(&self) -> bool {
        self.changes.iter().any(|c| c.status == FileStatus::Conflicted)
    }
}

impl GitClient {
    /// Open an existing repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether `name` resolves to a commit (local branch, remote branch, tag or SHA).
    pub fn branch_exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    fn resolve(&self, name: &str) -> Result<Commit<'_>, GitError> {
        self.repo
            .revparse_single(name)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| GitError::RefNotFound(name.to_string()))
    }

    /// Merge `from` into `to` in memory and report what would change on `to`.
    ///
    /// Cleanly merged paths carry the `to` content as "before" and the merged
    /// content as "after". Conflicted paths carry the marker-annotated merge
    /// output and its parsed regions.
    #[instrument(skip(self))]
    pub fn scratch_merge(&self, from: &str, to: &str) -> Result<ScratchMerge, GitError> {
        let theirs = self.resolve(from)?;
        let ours = self.resolve(to)?;
        let merge_base = self
            .repo
            .merge_base(ours.id(), theirs.id())
            .ok()
            .map(|oid| oid.to_string());
        debug!(ours = %ours.id(), theirs = %theirs.id(), ?merge_base, "merging commits in memory");

        let mut index = self.repo.merge_commits(&ours, &theirs, Some(&MergeOptions::new()))?;
        let mut changes = Vec::new();
        let mut conflicted_paths = BTreeSet::new();

        if index.has_conflicts() {
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                let Some(path) = [&conflict.our, &conflict.their, &conflict.ancestor]
                    .into_iter()
                    .flatten()
                    .map(entry_path)
                    .next()
                else {
                    continue;
                };
                let change = self.conflicted_change(
                    &path,
                    conflict.ancestor.as_ref(),
                    conflict.our.as_ref(),
                    conflict.their.as_ref(),
                )?;
                conflicted_paths.insert(path);
                changes.push(change);
            }
            for path in &conflicted_paths {
                index.remove_path(Path::new(path))?;
            }
        }

        changes.extend(self.clean_changes(&ours, &mut index, &conflicted_paths)?);
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        let merge = ScratchMerge {
            from: from.to_string(),
            to: to.to_string(),
            merge_base,
            changes,
        };
        info!(
            from,
            to,
            files = merge.changes.len(),
            conflicts = conflicted_paths.len(),
            "scratch merge complete"
        );
        Ok(merge)
    }

    /// Paths the merge changed without conflict, diffed against `ours`.
    fn clean_changes(
        &self,
        ours: &Commit<'_>,
        index: &mut Index,
        skip: &BTreeSet<String>,
    ) -> Result<Vec<FileChange>, GitError> {
        let merged_tree = self.repo.find_tree(index.write_tree_to(&self.repo)?)?;
        let ours_tree = ours.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&ours_tree), Some(&merged_tree), None)?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let Some(path) = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
            else {
                continue;
            };
            if skip.contains(&path) {
                continue;
            }
            let before = self.blob_content(delta.old_file().id())?;
            let after = self.blob_content(delta.new_file().id())?;
            let change = match (delta.status(), before, after) {
                (Delta::Added, _, Some(after)) => FileChange::added(path, after),
                (Delta::Deleted, Some(before), _) => FileChange::deleted(path, before),
                (_, Some(before), Some(after)) => FileChange::modified(path, before, after),
                (status, _, _) => {
                    warn!(%path, ?status, "skipping delta without content");
                    continue;
                }
            };
            changes.push(change);
        }
        Ok(changes)
    }

    fn conflicted_change(
        &self,
        path: &str,
        ancestor: Option<&IndexEntry>,
        ours: Option<&IndexEntry>,
        theirs: Option<&IndexEntry>,
    ) -> Result<FileChange, GitError> {
        let content = |entry: Option<&IndexEntry>| -> Result<Option<Vec<u8>>, GitError> {
            match entry {
                Some(e) => self.blob_content(e.id),
                None => Ok(None),
            }
        };
        let base = content(ancestor)?.unwrap_or_default();
        let before = content(ours)?;
        let ours_bytes = before.clone().unwrap_or_default();
        let theirs_bytes = content(theirs)?.unwrap_or_default();

        let merged = match diffy::merge_bytes(&base, &ours_bytes, &theirs_bytes) {
            Ok(merged) | Err(merged) => merged,
        };
        let mut regions = parse_conflict_markers(&String::from_utf8_lossy(&merged));
        if regions.is_empty() {
            // Modify/delete and binary conflicts leave no markers.
            regions.push(whole_file_region(&base, ours.is_some(), &ours_bytes, theirs.is_some(), &theirs_bytes));
        }
        debug!(path, regions = regions.len(), "conflicted path");
        Ok(FileChange::conflicted(path, before, merged, regions))
    }

    fn blob_content(&self, id: Oid) -> Result<Option<Vec<u8>>, GitError> {
        if id.is_zero() {
            return Ok(None);
        }
        Ok(Some(self.repo.find_blob(id)?.content().to_vec()))
    }
}

fn entry_path(entry: &IndexEntry) -> String {
    String::from_utf8_lossy(&entry.path).into_owned()
}

fn whole_file_region(
    base: &[u8],
    has_ours: bool,
    ours: &[u8],
    has_theirs: bool,
    theirs: &[u8],
) -> ConflictRegion {
    let side = |present: bool, bytes: &[u8]| {
        if present {
            String::from_utf8_lossy(bytes).into_owned()
        } else {
            String::new()
        }
    };
    let ours = side(has_ours, ours);
    let theirs = side(has_theirs, theirs);
    let end_line = ours.lines().count().max(theirs.lines().count()).max(1);
    ConflictRegion {
        ours,
        theirs,
        base: (!base.is_empty()).then(|| String::from_utf8_lossy(base).into_owned()),
        start_line: 1,
        end_line,
    }
}
