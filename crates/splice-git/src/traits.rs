//! Trait abstraction for repository queries.
//!
//! `GitOps` covers everything plan building needs to read, so plans can be
//! validated against an in-memory mock.

use std::path::Path;

use git2::Oid;

use crate::{Commit, Repository, Result};

/// Read-only repository queries.
#[allow(clippy::missing_errors_doc)]
pub trait GitOps {
    /// Get the working directory path.
    fn workdir(&self) -> Option<&Path>;

    /// Get the current branch name.
    ///
    /// Returns an error if HEAD is detached or not on a branch.
    fn current_branch(&self) -> Result<String>;

    /// Check if a branch exists.
    fn branch_exists(&self, name: &str) -> bool;

    /// Get the commit ID for a branch.
    fn branch_commit(&self, branch: &str) -> Result<Oid>;

    /// Resolve a revision expression to a commit ID.
    fn resolve_commit(&self, spec: &str) -> Result<Oid>;

    /// Read a commit.
    fn find_commit(&self, oid: Oid) -> Result<Commit>;

    /// Commits reachable from `to` but not `from`, oldest first.
    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<Commit>>;

    /// Check if `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool>;
}

impl GitOps for Repository {
    fn workdir(&self) -> Option<&Path> {
        Self::workdir(self)
    }

    fn current_branch(&self) -> Result<String> {
        Self::current_branch(self)
    }

    fn branch_exists(&self, name: &str) -> bool {
        Self::branch_exists(self, name)
    }

    fn branch_commit(&self, branch: &str) -> Result<Oid> {
        Self::branch_commit(self, branch)
    }

    fn resolve_commit(&self, spec: &str) -> Result<Oid> {
        Self::resolve_commit(self, spec)
    }

    fn find_commit(&self, oid: Oid) -> Result<Commit> {
        Self::find_commit(self, oid)
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<Commit>> {
        Self::commits_between(self, from, to)
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        Self::is_ancestor(self, ancestor, descendant)
    }
}
