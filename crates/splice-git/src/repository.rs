//! Repository wrapper for read-only queries.
//!
//! Mutations never go through git2; they are driven through the `git`
//! executable so git's own sequencer owns the on-disk state.

use std::path::Path;

use git2::{BranchType, Oid, Sort};

use crate::commit::Commit;
use crate::error::{Error, Result};

/// High-level wrapper around a git repository.
pub struct Repository {
    inner: git2::Repository,
}

impl Repository {
    /// Open a repository at the given path.
    ///
    /// # Errors
    /// Returns error if no repository found at path or any parent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::NotARepository
            } else {
                Error::Git2(e)
            }
        })?;
        Ok(Self { inner })
    }

    /// Open the repository containing the current directory.
    ///
    /// # Errors
    /// Returns error if not inside a git repository.
    pub fn open_current() -> Result<Self> {
        Self::open(".")
    }

    /// Get the path to the repository root (workdir).
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    /// Get the path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    // === Branch operations ===

    /// Get the name of the current branch.
    ///
    /// # Errors
    /// Returns error if HEAD is detached.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.inner.head()?;
        if !head.is_branch() {
            return Err(Error::DetachedHead);
        }

        head.shorthand()
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    /// Check if HEAD is detached.
    ///
    /// # Errors
    /// Returns error if HEAD cannot be read.
    pub fn head_detached(&self) -> Result<bool> {
        Ok(self.inner.head_detached()?)
    }

    /// Get the commit SHA for a branch.
    ///
    /// # Errors
    /// Returns error if branch doesn't exist.
    pub fn branch_commit(&self, branch_name: &str) -> Result<Oid> {
        let branch = self
            .inner
            .find_branch(branch_name, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(branch_name.into()))?;

        branch
            .get()
            .target()
            .ok_or_else(|| Error::BranchNotFound(branch_name.into()))
    }

    /// Check if a branch exists.
    #[must_use]
    pub fn branch_exists(&self, name: &str) -> bool {
        self.inner.find_branch(name, BranchType::Local).is_ok()
    }

    // === Commit operations ===

    /// Resolve a revision expression (sha, ref, `HEAD~2`, ...) to a commit.
    ///
    /// # Errors
    /// Returns `RefNotFound` if the revision doesn't name a commit.
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid> {
        self.inner
            .revparse_single(spec)
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id())
            .map_err(|_| Error::RefNotFound(spec.into()))
    }

    /// Get a commit by its SHA.
    ///
    /// # Errors
    /// Returns error if commit not found.
    pub fn find_commit(&self, oid: Oid) -> Result<Commit> {
        let commit = self
            .inner
            .find_commit(oid)
            .map_err(|_| Error::RefNotFound(oid.to_string()))?;
        Ok(Commit::from_git2(&commit))
    }

    /// Get the merge base between two commits.
    ///
    /// # Errors
    /// Returns error if merge base calculation fails.
    pub fn merge_base(&self, one: Oid, two: Oid) -> Result<Oid> {
        Ok(self.inner.merge_base(one, two)?)
    }

    /// Commits reachable from `to` but not from `from`, oldest first.
    ///
    /// With `from == None` the whole history of `to` is returned.
    ///
    /// # Errors
    /// Returns error if revwalk fails.
    pub fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<Commit>> {
        let mut revwalk = self.inner.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(to)?;
        if let Some(from) = from {
            revwalk.hide(from)?;
        }

        revwalk
            .map(|oid| {
                let commit = self.inner.find_commit(oid?)?;
                Ok(Commit::from_git2(&commit))
            })
            .collect()
    }

    /// Check if `ancestor` is reachable from `descendant` (or equal to it).
    ///
    /// # Errors
    /// Returns error if the graph walk fails.
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.inner.graph_descendant_of(descendant, ancestor)?)
    }

    // === Low-level access ===

    /// Get a reference to the underlying git2 repository.
    ///
    /// Use sparingly - prefer high-level methods.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.git_dir())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_file(repo: &git2::Repository, name: &str, message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), message).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit<'_>> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn init_test_repo() -> (TempDir, Repository, Vec<Oid>) {
        let temp = TempDir::new().unwrap();
        let repo = git2::Repository::init(temp.path()).unwrap();
        let oids = vec![
            commit_file(&repo, "a.txt", "initial"),
            commit_file(&repo, "b.txt", "first"),
            commit_file(&repo, "c.txt", "second"),
        ];
        (temp, Repository { inner: repo }, oids)
    }

    #[test]
    fn test_open_outside_repository() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Repository::open(temp.path()),
            Err(Error::NotARepository)
        ));
    }

    #[test]
    fn test_current_branch() {
        let (_temp, repo, _) = init_test_repo();
        let branch = repo.current_branch().unwrap();
        assert!(branch == "main" || branch == "master");
        assert!(repo.branch_exists(&branch));
        assert!(!repo.head_detached().unwrap());
    }

    #[test]
    fn test_detached_head() {
        let (_temp, repo, oids) = init_test_repo();
        repo.inner.set_head_detached(oids[1]).unwrap();

        assert!(matches!(repo.current_branch(), Err(Error::DetachedHead)));
        assert!(repo.head_detached().unwrap());
    }

    #[test]
    fn test_commits_between_oldest_first() {
        let (_temp, repo, oids) = init_test_repo();

        let commits = repo.commits_between(Some(oids[0]), oids[2]).unwrap();
        let summaries: Vec<_> = commits.iter().map(|c| c.summary.as_str()).collect();
        assert_eq!(summaries, vec!["first", "second"]);

        let all = repo.commits_between(None, oids[2]).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].is_root());
    }

    #[test]
    fn test_resolve_commit() {
        let (_temp, repo, oids) = init_test_repo();

        assert_eq!(repo.resolve_commit("HEAD").unwrap(), oids[2]);
        assert_eq!(repo.resolve_commit("HEAD~2").unwrap(), oids[0]);
        assert!(matches!(
            repo.resolve_commit("no-such-ref"),
            Err(Error::RefNotFound(_))
        ));
    }

    #[test]
    fn test_is_ancestor() {
        let (_temp, repo, oids) = init_test_repo();

        assert!(repo.is_ancestor(oids[0], oids[2]).unwrap());
        assert!(repo.is_ancestor(oids[2], oids[2]).unwrap());
        assert!(!repo.is_ancestor(oids[2], oids[0]).unwrap());
    }

    #[test]
    fn test_branch_commit_missing() {
        let (_temp, repo, _) = init_test_repo();
        assert!(matches!(
            repo.branch_commit("nope"),
            Err(Error::BranchNotFound(_))
        ));
    }
}
