//! Mock implementation of `GitOps` for plan-building tests.
//!
//! History is a single linear chain; commits are addressed by summary.

use std::collections::HashMap;
use std::path::Path;

use splice_git::{Commit, Error as GitError, GitOps, Identity, Oid, Result as GitResult};

/// Deterministic object id for test commit `n`.
pub fn oid(n: u32) -> Oid {
    Oid::from_str(&format!("{n:040x}")).unwrap_or_else(|_| Oid::zero())
}

fn identity() -> Identity {
    Identity {
        name: "Test".into(),
        email: "test@example.com".into(),
        when: 1_700_000_000,
        offset_minutes: 0,
    }
}

pub struct MockGitOps {
    pub current_branch: Option<String>,
    pub branches: HashMap<String, Oid>,
    pub history: Vec<Commit>,
}

impl MockGitOps {
    /// Linear history with `summaries` oldest first, checked out on `main`.
    pub fn linear(summaries: &[&str]) -> Self {
        let mut history: Vec<Commit> = Vec::with_capacity(summaries.len());
        for (n, summary) in (1..).zip(summaries) {
            let parents = history.last().map(|c| vec![c.sha]).unwrap_or_default();
            history.push(Commit {
                sha: oid(n),
                parents,
                author: identity(),
                committer: identity(),
                summary: (*summary).to_string(),
                body: String::new(),
                trailers: Vec::new(),
            });
        }

        let mut branches = HashMap::new();
        if let Some(tip) = history.last() {
            branches.insert("main".to_string(), tip.sha);
        }

        Self {
            current_branch: Some("main".into()),
            branches,
            history,
        }
    }

    pub fn with_branch(mut self, name: &str, oid: Oid) -> Self {
        self.branches.insert(name.to_string(), oid);
        self
    }

    pub fn detached(mut self) -> Self {
        self.current_branch = None;
        self
    }

    /// Commit with the given summary.
    pub fn commit(&self, summary: &str) -> Commit {
        self.history
            .iter()
            .find(|c| c.summary == summary)
            .cloned()
            .unwrap_or_else(|| panic!("no commit '{summary}'"))
    }

    fn index_of(&self, oid: Oid) -> Option<usize> {
        self.history.iter().position(|c| c.sha == oid)
    }
}

impl GitOps for MockGitOps {
    fn workdir(&self) -> Option<&Path> {
        None
    }

    fn current_branch(&self) -> GitResult<String> {
        self.current_branch.clone().ok_or(GitError::DetachedHead)
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    fn branch_commit(&self, branch: &str) -> GitResult<Oid> {
        self.branches
            .get(branch)
            .copied()
            .ok_or_else(|| GitError::BranchNotFound(branch.into()))
    }

    fn resolve_commit(&self, spec: &str) -> GitResult<Oid> {
        if let Some(oid) = self.branches.get(spec) {
            return Ok(*oid);
        }
        self.history
            .iter()
            .find(|c| c.summary == spec || c.sha.to_string() == spec)
            .map(|c| c.sha)
            .ok_or_else(|| GitError::RefNotFound(spec.into()))
    }

    fn find_commit(&self, oid: Oid) -> GitResult<Commit> {
        self.index_of(oid)
            .map(|i| self.history[i].clone())
            .ok_or_else(|| GitError::RefNotFound(oid.to_string()))
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> GitResult<Vec<Commit>> {
        let end = self
            .index_of(to)
            .ok_or_else(|| GitError::RefNotFound(to.to_string()))?;
        let start = from.and_then(|f| self.index_of(f)).map_or(0, |i| i + 1);
        Ok(self.history.get(start..=end).map(<[Commit]>::to_vec).unwrap_or_default())
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> GitResult<bool> {
        Ok(matches!(
            (self.index_of(ancestor), self.index_of(descendant)),
            (Some(a), Some(d)) if a <= d
        ))
    }
}
