//! Commit plan building.
//!
//! Plans are plain data. Building one reads the repository through
//! [`GitOps`] and never changes it; validation failures surface as
//! [`PlanError`] before anything is written.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use splice_git::{Commit, GitOps, Oid};

use crate::outcome::PlanError;

/// Kind of rewrite a plan performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Rebase,
    Squash,
    Reorder,
    Reword,
    CherryPick,
}

impl OperationKind {
    /// Whether the plan runs through `git rebase -i`.
    #[must_use]
    pub const fn is_rebase_family(self) -> bool {
        !matches!(self, Self::CherryPick)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rebase => "rebase",
            Self::Squash => "squash",
            Self::Reorder => "reorder",
            Self::Reword => "reword",
            Self::CherryPick => "cherry-pick",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instruction of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Apply the commit as-is.
    Pick(Commit),
    /// Fold the commit into the result of the previous step.
    Squash(Commit),
    /// Apply the commit, then replace its message.
    Reword(Commit),
    /// Leave the commit out.
    Drop(Commit),
}

impl Step {
    #[must_use]
    pub const fn commit(&self) -> &Commit {
        match self {
            Self::Pick(c) | Self::Squash(c) | Self::Reword(c) | Self::Drop(c) => c,
        }
    }

    /// Todo-list verb for the step.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Pick(_) => "pick",
            Self::Squash(_) => "squash",
            Self::Reword(_) => "reword",
            Self::Drop(_) => "drop",
        }
    }

    /// Whether git opens the message editor while applying the step.
    #[must_use]
    pub const fn opens_editor(&self) -> bool {
        matches!(self, Self::Squash(_) | Self::Reword(_))
    }

    #[must_use]
    pub const fn applies_commit(&self) -> bool {
        !matches!(self, Self::Drop(_))
    }
}

/// Where rewritten history starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    /// Replay on top of this commit.
    Onto(Oid),
    /// Replay from the root of the branch.
    Root,
}

impl Base {
    #[must_use]
    pub const fn oid(self) -> Option<Oid> {
        match self {
            Self::Onto(oid) => Some(oid),
            Self::Root => None,
        }
    }
}

/// An ordered, validated rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    kind: OperationKind,
    branch: String,
    expected_tip: Oid,
    base: Base,
    steps: Vec<Step>,
    message: Option<String>,
}

impl OperationPlan {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Branch being rewritten; the target branch for cherry-pick.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Tip of [`Self::branch`] when the plan was built.
    #[must_use]
    pub const fn expected_tip(&self) -> Oid {
        self.expected_tip
    }

    #[must_use]
    pub const fn base(&self) -> Base {
        self.base
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Message for squash and reword steps.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Number of steps that apply a commit.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.applies_commit()).count()
    }

    /// Whether any step is a merge commit.
    #[must_use]
    pub fn has_merges(&self) -> bool {
        self.steps.iter().any(|s| s.commit().is_merge())
    }

    /// Render the interactive-rebase todo list.
    ///
    /// A `break` follows every commit-applying step except the last one, so
    /// git stops after each step and the driver can inspect the result.
    #[must_use]
    pub fn render_todo(&self) -> String {
        let total = self.total_steps();
        let mut applied = 0;
        let mut todo = String::new();

        for step in &self.steps {
            let commit = step.commit();
            todo.push_str(&format!("{} {} {}\n", step.verb(), commit.sha, commit.summary));
            if step.applies_commit() {
                applied += 1;
                if applied < total {
                    todo.push_str("break\n");
                }
            }
        }

        if todo.is_empty() {
            todo.push_str("noop\n");
        }
        todo
    }
}

/// Plan rebasing `current` onto `target`.
///
/// Merge commits are left out, matching git's default rebase.
///
/// # Errors
/// Returns error if either ref cannot be resolved.
pub fn plan_rebase<G: GitOps>(
    repo: &G,
    target: &str,
    current: &str,
) -> Result<OperationPlan, PlanError> {
    let target_tip = resolve(repo, target)?;
    let current_tip = repo
        .branch_commit(current)
        .map_err(|_| PlanError::UnresolvableRef(current.to_string()))?;

    let steps = repo
        .commits_between(Some(target_tip), current_tip)
        .map_err(repository)?
        .into_iter()
        .filter(|c| !c.is_merge())
        .map(Step::Pick)
        .collect();

    Ok(OperationPlan {
        kind: OperationKind::Rebase,
        branch: current.to_string(),
        expected_tip: current_tip,
        base: Base::Onto(target_tip),
        steps,
        message: None,
    })
}

/// Plan squashing `to_squash` onto `squash_onto`.
///
/// `last_retained` is the newest commit left untouched; `None` rewrites the
/// branch from its root.
///
/// # Errors
/// Returns error for an empty squash set, a destination inside the set, an
/// unresolvable `last_retained`, or commits outside the rewritten range.
pub fn plan_squash<G: GitOps>(
    repo: &G,
    to_squash: &[Commit],
    squash_onto: &Commit,
    last_retained: Option<&str>,
    message: &str,
) -> Result<OperationPlan, PlanError> {
    if to_squash.is_empty() {
        return Err(PlanError::EmptyOperandSet);
    }
    if to_squash.iter().any(|c| c.sha == squash_onto.sha) {
        return Err(PlanError::DestinationInSquashSet(squash_onto.sha));
    }
    let squash_set = unique_shas(to_squash)?;

    let (branch, tip) = current_tip(repo)?;
    let base = base_for(repo, last_retained, tip)?;
    let range = range(repo, base, tip)?;

    require_in_range(&range, std::iter::once(squash_onto.sha).chain(squash_set.iter().copied()))?;

    let mut steps = Vec::with_capacity(range.len());
    let mut held_group = Vec::new();
    let mut held_after = Vec::new();
    let mut found_onto = false;

    for commit in range {
        if commit.sha == squash_onto.sha {
            found_onto = true;
            held_group.push(commit);
            let mut group = std::mem::take(&mut held_group).into_iter();
            if let Some(head) = group.next() {
                steps.push(Step::Pick(head));
            }
            steps.extend(group.map(Step::Squash));
        } else if squash_set.contains(&commit.sha) {
            if found_onto {
                steps.push(Step::Squash(commit));
            } else {
                held_group.push(commit);
            }
        } else if found_onto {
            held_after.push(commit);
        } else {
            steps.push(Step::Pick(commit));
        }
    }
    steps.extend(held_after.into_iter().map(Step::Pick));

    let message = if message.trim().is_empty() {
        default_squash_message(squash_onto, to_squash)
    } else {
        message.to_string()
    };

    Ok(OperationPlan {
        kind: OperationKind::Squash,
        branch,
        expected_tip: tip,
        base,
        steps,
        message: Some(message),
    })
}

/// Destination summary, a blank line, then one squashed summary per line.
fn default_squash_message(onto: &Commit, squashed: &[Commit]) -> String {
    let summaries: Vec<&str> = squashed.iter().map(|c| c.summary.as_str()).collect();
    format!("{}\n\n{}", onto.summary, summaries.join("\n"))
}

/// Plan re-picking `order` (oldest first in the result) at the position of
/// the earliest of them; other commits keep their relative position.
///
/// # Errors
/// Returns error for an empty or duplicated list, an unresolvable
/// `last_retained`, or commits outside the rewritten range.
pub fn plan_reorder<G: GitOps>(
    repo: &G,
    order: &[Oid],
    last_retained: Option<&str>,
) -> Result<OperationPlan, PlanError> {
    if order.is_empty() {
        return Err(PlanError::EmptyOperandSet);
    }
    let mut moved = HashSet::with_capacity(order.len());
    for sha in order {
        if !moved.insert(*sha) {
            return Err(PlanError::DuplicateCommit(*sha));
        }
    }

    let (branch, tip) = current_tip(repo)?;
    let base = base_for(repo, last_retained, tip)?;
    let range = range(repo, base, tip)?;
    require_in_range(&range, order.iter().copied())?;

    let mut steps = Vec::with_capacity(range.len());
    let mut placed = false;
    for commit in &range {
        if !moved.contains(&commit.sha) {
            steps.push(Step::Pick(commit.clone()));
        } else if !placed {
            placed = true;
            for sha in order {
                if let Some(c) = range.iter().find(|c| c.sha == *sha) {
                    steps.push(Step::Pick(c.clone()));
                }
            }
        }
    }

    Ok(OperationPlan {
        kind: OperationKind::Reorder,
        branch,
        expected_tip: tip,
        base,
        steps,
        message: None,
    })
}

/// Plan replacing the message of `commit` on the current branch.
///
/// # Errors
/// Returns error for a blank message or a commit not on the current branch.
pub fn plan_reword<G: GitOps>(
    repo: &G,
    commit: &Commit,
    message: &str,
) -> Result<OperationPlan, PlanError> {
    if message.trim().is_empty() {
        return Err(PlanError::EmptyMessage);
    }
    if commit.is_merge() {
        return Err(PlanError::MergeInRange(commit.sha));
    }

    let (branch, tip) = current_tip(repo)?;
    if !repo.is_ancestor(commit.sha, tip).map_err(repository)? {
        return Err(PlanError::NotInRange(commit.sha));
    }
    let base = commit.parents.first().map_or(Base::Root, |p| Base::Onto(*p));
    let range = range(repo, base, tip)?;

    let steps = range
        .into_iter()
        .map(|c| {
            if c.sha == commit.sha {
                Step::Reword(c)
            } else {
                Step::Pick(c)
            }
        })
        .collect();

    Ok(OperationPlan {
        kind: OperationKind::Reword,
        branch,
        expected_tip: tip,
        base,
        steps,
        message: Some(message.to_string()),
    })
}

/// Plan cherry-picking `commits`, in the given order, onto `target_branch`.
///
/// # Errors
/// Returns error for an empty list, an unknown target branch, or commits that
/// don't exist.
pub fn plan_cherry_pick<G: GitOps>(
    repo: &G,
    commits: &[Commit],
    target_branch: &str,
) -> Result<OperationPlan, PlanError> {
    if commits.is_empty() {
        return Err(PlanError::EmptyOperandSet);
    }
    let target_tip = repo
        .branch_commit(target_branch)
        .map_err(|_| PlanError::UnresolvableRef(target_branch.to_string()))?;

    for commit in commits {
        repo.find_commit(commit.sha)
            .map_err(|_| PlanError::UnresolvableRef(commit.sha.to_string()))?;
    }

    Ok(OperationPlan {
        kind: OperationKind::CherryPick,
        branch: target_branch.to_string(),
        expected_tip: target_tip,
        base: Base::Onto(target_tip),
        steps: commits.iter().cloned().map(Step::Pick).collect(),
        message: None,
    })
}

fn repository(e: splice_git::Error) -> PlanError {
    PlanError::Repository(e.to_string())
}

fn resolve<G: GitOps>(repo: &G, spec: &str) -> Result<Oid, PlanError> {
    repo.branch_commit(spec)
        .or_else(|_| repo.resolve_commit(spec))
        .map_err(|_| PlanError::UnresolvableRef(spec.to_string()))
}

fn current_tip<G: GitOps>(repo: &G) -> Result<(String, Oid), PlanError> {
    let branch = repo.current_branch().map_err(|e| match e {
        splice_git::Error::DetachedHead => PlanError::DetachedHead,
        other => repository(other),
    })?;
    let tip = repo.branch_commit(&branch).map_err(repository)?;
    Ok((branch, tip))
}

fn base_for<G: GitOps>(repo: &G, last_retained: Option<&str>, tip: Oid) -> Result<Base, PlanError> {
    let Some(spec) = last_retained else {
        return Ok(Base::Root);
    };
    let oid = repo
        .resolve_commit(spec)
        .map_err(|_| PlanError::UnresolvableRef(spec.to_string()))?;
    if !repo.is_ancestor(oid, tip).map_err(repository)? {
        return Err(PlanError::NotAnAncestor(oid));
    }
    Ok(Base::Onto(oid))
}

fn range<G: GitOps>(repo: &G, base: Base, tip: Oid) -> Result<Vec<Commit>, PlanError> {
    let commits = repo.commits_between(base.oid(), tip).map_err(repository)?;
    if commits.is_empty() {
        return Err(PlanError::EmptyRange);
    }
    if let Some(merge) = commits.iter().find(|c| c.is_merge()) {
        return Err(PlanError::MergeInRange(merge.sha));
    }
    Ok(commits)
}

fn unique_shas(commits: &[Commit]) -> Result<HashSet<Oid>, PlanError> {
    let mut set = HashSet::with_capacity(commits.len());
    for commit in commits {
        if !set.insert(commit.sha) {
            return Err(PlanError::DuplicateCommit(commit.sha));
        }
    }
    Ok(set)
}

fn require_in_range(
    range: &[Commit],
    shas: impl IntoIterator<Item = Oid>,
) -> Result<(), PlanError> {
    let in_range: HashSet<Oid> = range.iter().map(|c| c.sha).collect();
    shas.into_iter()
        .find(|sha| !in_range.contains(sha))
        .map_or(Ok(()), |sha| Err(PlanError::NotInRange(sha)))
}
