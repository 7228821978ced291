//! In-progress operation state read from git's sequencer files.
//!
//! Nothing here is cached: every call reads the git directory afresh, so the
//! result always reflects what git itself will act on next.

use std::fs;
use std::path::{Path, PathBuf};

use git2::Oid;
use tracing::debug;

use crate::error::{Error, Result};

/// Instruction verb of a todo line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoAction {
    Pick,
    Revert,
    Reword,
    Edit,
    Squash,
    Fixup,
    Exec,
    Break,
    Drop,
    Label,
    Reset,
    Merge,
    UpdateRef,
    Noop,
}

impl TodoAction {
    fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "pick" | "p" => Self::Pick,
            "revert" => Self::Revert,
            "reword" | "r" => Self::Reword,
            "edit" | "e" => Self::Edit,
            "squash" | "s" => Self::Squash,
            "fixup" | "f" => Self::Fixup,
            "exec" | "x" => Self::Exec,
            "break" | "b" => Self::Break,
            "drop" | "d" => Self::Drop,
            "label" | "l" => Self::Label,
            "reset" | "t" => Self::Reset,
            "merge" | "m" => Self::Merge,
            "update-ref" | "u" => Self::UpdateRef,
            "noop" => Self::Noop,
            _ => return None,
        })
    }

    /// Whether the instruction applies a commit.
    #[must_use]
    pub const fn applies_commit(self) -> bool {
        matches!(
            self,
            Self::Pick | Self::Revert | Self::Reword | Self::Edit | Self::Squash | Self::Fixup
        )
    }
}

/// One parsed line of a todo or done list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoLine {
    pub action: TodoAction,
    /// Commit id as written by git; may be abbreviated.
    pub commit: Option<String>,
    pub summary: String,
}

/// Parse a sequencer instruction list, skipping comments and blank lines.
#[must_use]
pub fn parse_todo(contents: &str) -> Vec<TodoLine> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(3, ' ');
            let action = TodoAction::parse(parts.next()?)?;
            if !action.applies_commit() {
                return Some(TodoLine {
                    action,
                    commit: None,
                    summary: line.split_once(' ').map_or("", |(_, r)| r).to_string(),
                });
            }
            Some(TodoLine {
                action,
                commit: parts.next().map(String::from),
                summary: parts.next().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Progress through a rebase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RebaseProgress {
    /// Commit-applying steps started so far (1-based index of the current one).
    pub position: usize,
    /// Commit-applying steps in the whole rebase.
    pub total: usize,
    /// Instructions already executed, most recent last.
    pub done: Vec<TodoLine>,
    /// Instructions still to run.
    pub remaining: Vec<TodoLine>,
}

impl RebaseProgress {
    /// The last commit-applying instruction git started.
    #[must_use]
    pub fn current(&self) -> Option<&TodoLine> {
        self.done.iter().rev().find(|l| l.action.applies_commit())
    }

    /// The next commit-applying instruction git will run.
    #[must_use]
    pub fn next(&self) -> Option<&TodoLine> {
        self.remaining.iter().find(|l| l.action.applies_commit())
    }

    /// Whether git stopped on a `break` instruction.
    #[must_use]
    pub fn stopped_at_break(&self) -> bool {
        self.done.last().is_some_and(|l| l.action == TodoAction::Break)
    }
}

/// An interactive or merge-backend rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseState {
    /// Tip of the branch being rebased, before the rebase started.
    pub original_branch_tip: Oid,
    /// Commit the rewritten history is being built on.
    pub base_branch_tip: Oid,
    /// Branch being rebased; `None` when a detached HEAD is being rebased.
    pub target_branch: Option<String>,
    pub progress: RebaseProgress,
}

/// A cherry-pick sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CherryPickState {
    /// The commit being picked when git stopped.
    pub head: Option<Oid>,
    /// HEAD before the sequence started (absent for a single pick).
    pub original_tip: Option<Oid>,
    /// Picks still to apply, including the stopped one.
    pub remaining: Vec<TodoLine>,
}

/// What the repository is in the middle of, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    None,
    Rebase(RebaseState),
    CherryPick(CherryPickState),
    Merge { merge_head: Oid },
}

impl OperationState {
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Short name for messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rebase(_) => "rebase",
            Self::CherryPick(_) => "cherry-pick",
            Self::Merge { .. } => "merge",
        }
    }
}

/// Read the operation state of the repository containing `repo_path`.
///
/// A path outside any repository reports [`OperationState::None`].
///
/// # Errors
/// Returns error if sequencer files exist but cannot be read or parsed.
pub fn get_operation_state(repo_path: &Path) -> Result<OperationState> {
    match discover_git_dir(repo_path)? {
        Some(git_dir) => read_operation_state(&git_dir),
        None => Ok(OperationState::None),
    }
}

/// Locate the git directory for `path`, or `None` outside a repository.
///
/// # Errors
/// Returns error for failures other than "not found".
pub fn discover_git_dir(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    match git2::Repository::discover(path) {
        Ok(repo) => Ok(Some(repo.path().to_path_buf())),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read the operation state from a git directory.
///
/// # Errors
/// Returns error if sequencer files exist but cannot be read or parsed.
pub fn read_operation_state(git_dir: &Path) -> Result<OperationState> {
    let merge_dir = git_dir.join("rebase-merge");
    if merge_dir.is_dir() {
        return read_rebase_merge(&merge_dir).map(OperationState::Rebase);
    }

    let apply_dir = git_dir.join("rebase-apply");
    if apply_dir.is_dir() && !apply_dir.join("applying").exists() {
        return read_rebase_apply(&apply_dir).map(OperationState::Rebase);
    }

    let cherry_head = read_oid_file(&git_dir.join("CHERRY_PICK_HEAD"))?;
    let sequencer = git_dir.join("sequencer");
    if cherry_head.is_some() || sequencer.join("todo").is_file() {
        let remaining = read_file(&sequencer.join("todo"))?
            .map(|s| parse_todo(&s))
            .unwrap_or_default();
        let is_revert = remaining
            .first()
            .is_some_and(|l| l.action == TodoAction::Revert);
        if !is_revert {
            return Ok(OperationState::CherryPick(CherryPickState {
                head: cherry_head,
                original_tip: read_oid_file(&sequencer.join("head"))?,
                remaining,
            }));
        }
    }

    if let Some(merge_head) = read_oid_file(&git_dir.join("MERGE_HEAD"))? {
        return Ok(OperationState::Merge { merge_head });
    }

    Ok(OperationState::None)
}

fn read_rebase_merge(dir: &Path) -> Result<RebaseState> {
    let done = read_file(&dir.join("done"))?
        .map(|s| parse_todo(&s))
        .unwrap_or_default();
    let remaining = read_file(&dir.join("git-rebase-todo"))?
        .map(|s| parse_todo(&s))
        .unwrap_or_default();

    let position = done.iter().filter(|l| l.action.applies_commit()).count();
    let total = position + remaining.iter().filter(|l| l.action.applies_commit()).count();

    let state = RebaseState {
        original_branch_tip: require_oid(dir, "orig-head")?,
        base_branch_tip: require_oid(dir, "onto")?,
        target_branch: read_head_name(dir)?,
        progress: RebaseProgress {
            position,
            total,
            done,
            remaining,
        },
    };
    debug!(
        position = state.progress.position,
        total = state.progress.total,
        "read rebase-merge state"
    );
    Ok(state)
}

fn read_rebase_apply(dir: &Path) -> Result<RebaseState> {
    let number = |name: &str| -> Result<usize> {
        read_file(&dir.join(name))?
            .map_or(Ok(0), |s| s.trim().parse::<usize>())
            .map_err(|e| Error::parse("rebase-apply", format!("{name}: {e}")))
    };

    Ok(RebaseState {
        original_branch_tip: require_oid(dir, "orig-head")?,
        base_branch_tip: require_oid(dir, "onto")?,
        target_branch: read_head_name(dir)?,
        progress: RebaseProgress {
            position: number("next")?,
            total: number("last")?,
            done: Vec::new(),
            remaining: Vec::new(),
        },
    })
}

fn read_head_name(dir: &Path) -> Result<Option<String>> {
    Ok(read_file(&dir.join("head-name"))?.and_then(|name| {
        let name = name.trim();
        name.strip_prefix("refs/heads/").map(String::from)
    }))
}

fn require_oid(dir: &Path, name: &str) -> Result<Oid> {
    read_oid_file(&dir.join(name))?.ok_or_else(|| {
        Error::parse(
            "sequencer state",
            format!("missing {}", dir.join(name).display()),
        )
    })
}

fn read_oid_file(path: &Path) -> Result<Option<Oid>> {
    let Some(contents) = read_file(path)? else {
        return Ok(None);
    };
    let hex = contents.lines().next().unwrap_or_default().trim();
    if hex.is_empty() {
        return Ok(None);
    }
    Oid::from_str(hex)
        .map(Some)
        .map_err(|e| Error::parse("sequencer state", format!("{}: {e}", path.display())))
}

fn read_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ORIG: &str = "1111111111111111111111111111111111111111";
    const ONTO: &str = "2222222222222222222222222222222222222222";
    const PICK: &str = "3333333333333333333333333333333333333333";

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_no_operation() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            read_operation_state(temp.path()).unwrap(),
            OperationState::None
        );
    }

    #[test]
    fn test_outside_repository() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            get_operation_state(temp.path()).unwrap(),
            OperationState::None
        );
    }

    #[test]
    fn test_reads_interactive_rebase() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("rebase-merge");
        write(&dir, "orig-head", &format!("{ORIG}\n"));
        write(&dir, "onto", &format!("{ONTO}\n"));
        write(&dir, "head-name", "refs/heads/feature/x\n");
        write(
            &dir,
            "done",
            &format!("pick {ORIG} first\nbreak\npick {PICK} second\n"),
        );
        write(
            &dir,
            "git-rebase-todo",
            &format!("break\nsquash {PICK} third\n\n# Rebase 2222..1111 onto 2222\n"),
        );

        let OperationState::Rebase(state) = read_operation_state(temp.path()).unwrap() else {
            panic!("expected rebase state");
        };

        assert_eq!(state.original_branch_tip, Oid::from_str(ORIG).unwrap());
        assert_eq!(state.base_branch_tip, Oid::from_str(ONTO).unwrap());
        assert_eq!(state.target_branch.as_deref(), Some("feature/x"));
        assert_eq!(state.progress.position, 2);
        assert_eq!(state.progress.total, 3);
        assert_eq!(state.progress.current().unwrap().summary, "second");
        assert_eq!(state.progress.next().unwrap().action, TodoAction::Squash);
        assert!(!state.progress.stopped_at_break());
    }

    #[test]
    fn test_detached_rebase_has_no_target_branch() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("rebase-merge");
        write(&dir, "orig-head", ORIG);
        write(&dir, "onto", ONTO);
        write(&dir, "head-name", "detached HEAD\n");

        let OperationState::Rebase(state) = read_operation_state(temp.path()).unwrap() else {
            panic!("expected rebase state");
        };
        assert_eq!(state.target_branch, None);
        assert_eq!(state.progress.total, 0);
    }

    #[test]
    fn test_rebase_without_onto_is_an_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("rebase-merge");
        write(&dir, "orig-head", ORIG);

        assert!(read_operation_state(temp.path()).is_err());
    }

    #[test]
    fn test_reads_cherry_pick_sequence() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "CHERRY_PICK_HEAD", &format!("{PICK}\n"));
        let seq = temp.path().join("sequencer");
        write(&seq, "head", &format!("{ONTO}\n"));
        write(&seq, "todo", &format!("pick {PICK} second\npick {ORIG} third\n"));

        let OperationState::CherryPick(state) = read_operation_state(temp.path()).unwrap() else {
            panic!("expected cherry-pick state");
        };
        assert_eq!(state.head, Some(Oid::from_str(PICK).unwrap()));
        assert_eq!(state.original_tip, Some(Oid::from_str(ONTO).unwrap()));
        assert_eq!(state.remaining.len(), 2);
    }

    #[test]
    fn test_reads_merge() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "MERGE_HEAD", &format!("{PICK}\n"));

        assert_eq!(
            read_operation_state(temp.path()).unwrap(),
            OperationState::Merge {
                merge_head: Oid::from_str(PICK).unwrap()
            }
        );
    }

    #[test]
    fn test_parse_todo_abbreviated_commands() {
        let lines = parse_todo("p abc123 one two\nb\ns def456 three\nexec make test\n");

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].action, TodoAction::Pick);
        assert_eq!(lines[0].commit.as_deref(), Some("abc123"));
        assert_eq!(lines[0].summary, "one two");
        assert_eq!(lines[1].action, TodoAction::Break);
        assert_eq!(lines[2].action, TodoAction::Squash);
        assert_eq!(lines[3].action, TodoAction::Exec);
        assert_eq!(lines[3].summary, "make test");
    }
}
