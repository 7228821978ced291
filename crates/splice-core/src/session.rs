//! Operation sessions.
//!
//! git's sequencer files are the source of truth for an in-progress rewrite.
//! The journal only records what git can't: the operation kind, the pending
//! message and, for cherry-pick, the branch to return to on abort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splice_git::{OperationState, Oid};
use tracing::warn;

use crate::plan::{Base, OperationKind, OperationPlan};

/// Persisted companion to git's sequencer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionJournal {
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    /// Branch being rewritten; the target branch for cherry-pick.
    pub branch: String,
    /// Branch checked out when the operation began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_branch: Option<String>,
    /// Tip of `branch` when the operation began.
    pub original_tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_tip: Option<String>,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SessionJournal {
    /// Journal for a plan about to start.
    #[must_use]
    pub fn for_plan(plan: &OperationPlan, original_branch: Option<String>) -> Self {
        Self {
            kind: plan.kind(),
            started_at: Utc::now(),
            branch: plan.branch().to_string(),
            original_branch,
            original_tip: plan.expected_tip().to_string(),
            base_tip: match plan.base() {
                Base::Onto(oid) => Some(oid.to_string()),
                Base::Root => None,
            },
            total_steps: plan.total_steps(),
            message: plan.message().map(String::from),
        }
    }
}

/// In-memory view of an operation in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSession {
    pub kind: OperationKind,
    /// Branch being rewritten, when known.
    pub branch: Option<String>,
    /// Branch to return to after an abort.
    pub original_branch: Option<String>,
    pub original_tip: Option<Oid>,
    pub base_tip: Option<Oid>,
    /// 1-based index of the step git is on.
    pub current_step: usize,
    pub total_steps: usize,
    /// Message for squash and reword steps.
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Rebuild the session from what is on disk.
///
/// The journal is only trusted when it describes the operation git reports;
/// otherwise the session is derived from the sequencer state alone.
#[must_use]
pub fn reconstruct_session(
    disk: &OperationState,
    journal: Option<&SessionJournal>,
) -> Option<OperationSession> {
    match disk {
        OperationState::None | OperationState::Merge { .. } => None,
        OperationState::Rebase(rebase) => {
            let journal = journal.filter(|j| {
                let matches = j.kind.is_rebase_family()
                    && j.original_tip == rebase.original_branch_tip.to_string();
                if !matches {
                    warn!(
                        kind = %j.kind,
                        "ignoring journal that doesn't match the rebase in progress"
                    );
                }
                matches
            });

            Some(OperationSession {
                kind: journal.map_or(OperationKind::Rebase, |j| j.kind),
                branch: rebase
                    .target_branch
                    .clone()
                    .or_else(|| journal.map(|j| j.branch.clone())),
                original_branch: journal
                    .and_then(|j| j.original_branch.clone())
                    .or_else(|| rebase.target_branch.clone()),
                original_tip: Some(rebase.original_branch_tip),
                base_tip: Some(rebase.base_branch_tip),
                current_step: rebase.progress.position,
                total_steps: rebase.progress.total,
                message: journal.and_then(|j| j.message.clone()),
                started_at: journal.map(|j| j.started_at),
            })
        }
        OperationState::CherryPick(pick) => {
            let journal = journal.filter(|j| {
                let matches = j.kind == OperationKind::CherryPick
                    && pick
                        .original_tip
                        .is_none_or(|tip| j.original_tip == tip.to_string());
                if !matches {
                    warn!(
                        kind = %j.kind,
                        "ignoring journal that doesn't match the cherry-pick in progress"
                    );
                }
                matches
            });

            let remaining = pick.remaining.len().max(1);
            let total = journal.map_or(remaining, |j| j.total_steps.max(remaining));

            Some(OperationSession {
                kind: OperationKind::CherryPick,
                branch: journal.map(|j| j.branch.clone()),
                original_branch: journal.and_then(|j| j.original_branch.clone()),
                original_tip: pick.original_tip.or_else(|| {
                    journal.and_then(|j| Oid::from_str(&j.original_tip).ok())
                }),
                base_tip: pick.original_tip,
                current_step: total - remaining + 1,
                total_steps: total,
                message: None,
                started_at: journal.map(|j| j.started_at),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use splice_git::{CherryPickState, RebaseProgress, RebaseState, TodoAction, TodoLine};

    fn oid(c: char) -> Oid {
        Oid::from_str(&c.to_string().repeat(40)).unwrap()
    }

    fn pick(summary: &str) -> TodoLine {
        TodoLine {
            action: TodoAction::Pick,
            commit: Some("abc".into()),
            summary: summary.into(),
        }
    }

    fn rebase_state() -> OperationState {
        OperationState::Rebase(RebaseState {
            original_branch_tip: oid('1'),
            base_branch_tip: oid('2'),
            target_branch: Some("feature".into()),
            progress: RebaseProgress {
                position: 2,
                total: 3,
                done: vec![pick("a"), pick("b")],
                remaining: vec![pick("c")],
            },
        })
    }

    fn journal(kind: OperationKind, tip: Oid) -> SessionJournal {
        SessionJournal {
            kind,
            started_at: Utc::now(),
            branch: "feature".into(),
            original_branch: Some("feature".into()),
            original_tip: tip.to_string(),
            base_tip: Some(oid('2').to_string()),
            total_steps: 3,
            message: Some("Combined".into()),
        }
    }

    #[test]
    fn test_nothing_in_progress() {
        assert_eq!(reconstruct_session(&OperationState::None, None), None);
        let journal = journal(OperationKind::Squash, oid('1'));
        assert_eq!(
            reconstruct_session(&OperationState::None, Some(&journal)),
            None
        );
    }

    #[test]
    fn test_rebase_with_matching_journal() {
        let journal = journal(OperationKind::Squash, oid('1'));
        let session = reconstruct_session(&rebase_state(), Some(&journal)).unwrap();

        assert_eq!(session.kind, OperationKind::Squash);
        assert_eq!(session.original_tip, Some(oid('1')));
        assert_eq!(session.base_tip, Some(oid('2')));
        assert_eq!(session.current_step, 2);
        assert_eq!(session.total_steps, 3);
        assert_eq!(session.message.as_deref(), Some("Combined"));
    }

    #[test]
    fn test_rebase_without_journal() {
        let session = reconstruct_session(&rebase_state(), None).unwrap();

        assert_eq!(session.kind, OperationKind::Rebase);
        assert_eq!(session.branch.as_deref(), Some("feature"));
        assert_eq!(session.message, None);
        assert_eq!(session.started_at, None);
    }

    #[test]
    fn test_rebase_ignores_mismatched_journal() {
        let stale = journal(OperationKind::Squash, oid('9'));
        let session = reconstruct_session(&rebase_state(), Some(&stale)).unwrap();
        assert_eq!(session.kind, OperationKind::Rebase);
        assert_eq!(session.message, None);

        let wrong_kind = journal(OperationKind::CherryPick, oid('1'));
        let session = reconstruct_session(&rebase_state(), Some(&wrong_kind)).unwrap();
        assert_eq!(session.kind, OperationKind::Rebase);
    }

    #[test]
    fn test_cherry_pick_position() {
        let disk = OperationState::CherryPick(CherryPickState {
            head: Some(oid('3')),
            original_tip: Some(oid('1')),
            remaining: vec![pick("b"), pick("c")],
        });
        let mut journal = journal(OperationKind::CherryPick, oid('1'));
        journal.original_branch = Some("main".into());
        journal.total_steps = 3;

        let session = reconstruct_session(&disk, Some(&journal)).unwrap();

        assert_eq!(session.kind, OperationKind::CherryPick);
        assert_eq!(session.current_step, 2);
        assert_eq!(session.total_steps, 3);
        assert_eq!(session.original_branch.as_deref(), Some("main"));
    }
}
