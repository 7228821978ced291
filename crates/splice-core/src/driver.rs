//! Operation driver.
//!
//! Runs a plan through git's own sequencer one step at a time and classifies
//! where it stopped. Rebase-family plans run as `git rebase -i` with a todo
//! list that breaks after every step; cherry-picks run as one
//! `git cherry-pick` of all commits. After every git invocation the on-disk
//! operation state and the working-directory status are read again, so the
//! driver never trusts its own cached view over what git reports.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use splice_git::{
    Commit, ExecOptions, ExecOutput, GitCli, GitErrorKind, GitExecutor, OperationState, Oid,
    RebaseState, Repository, StatusResult, TodoAction, get_operation_state, get_status,
};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::conflict::{Resolution, ResolutionRequest, apply_resolutions, resolution_requests};
use crate::error::{Error, Result};
use crate::message::{EditorFile, GIT_EDITOR, GIT_SEQUENCE_EDITOR, KeepMessage, MessageProvider};
use crate::outcome::{Failure, GitFailure, OperationResult, PlanError, Precondition};
use crate::plan::{self, OperationKind, OperationPlan, Step};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::session::{OperationSession, SessionJournal, reconstruct_session};
use crate::state::{State, UndoRecord};

/// Lifecycle of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Conflicted,
    Resolving,
    Completed,
    Aborted,
    Failed,
}

/// Drives rewrites of one repository.
pub struct OperationDriver<E: GitExecutor = GitCli> {
    repo: Repository,
    workdir: PathBuf,
    git: E,
    state: State,
    config: Config,
    session: Option<OperationSession>,
    driver_state: DriverState,
    reporter: ProgressReporter,
    cancel: CancelHandle,
}

impl OperationDriver<GitCli> {
    /// Open the repository containing `path`, using its splice config.
    ///
    /// Any operation already in progress is picked up from disk.
    ///
    /// # Errors
    /// Returns error if `path` is not inside a non-bare repository or its
    /// state can't be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| match e {
            splice_git::Error::NotARepository => Error::NotARepository,
            other => Error::Git(other),
        })?;
        let state = State::new(repo.git_dir())?;
        let config = state.load_config()?;
        let git = config.executor();
        Self::with_executor(repo, git, config)
    }
}

impl<E: GitExecutor> OperationDriver<E> {
    /// Build a driver around an explicit executor and config.
    ///
    /// # Errors
    /// Returns error for a bare repository or unreadable state.
    pub fn with_executor(repo: Repository, git: E, config: Config) -> Result<Self> {
        let workdir = repo
            .workdir()
            .ok_or(splice_git::Error::BareRepository)?
            .to_path_buf();
        let state = State::new(repo.git_dir())?;

        let mut driver = Self {
            repo,
            workdir,
            git,
            state,
            config,
            session: None,
            driver_state: DriverState::Idle,
            reporter: ProgressReporter::default(),
            cancel: CancelHandle::new(),
        };
        driver.refresh()?;
        Ok(driver)
    }

    /// Re-derive the session from git's sequencer state and the journal.
    fn refresh(&mut self) -> Result<()> {
        let disk = self.operation_state()?;
        let journal = self.state.load_session()?;
        self.session = reconstruct_session(&disk, journal.as_ref());

        self.driver_state = match &self.session {
            Some(session) => {
                self.reporter.resume(session.kind);
                debug!(
                    kind = %session.kind,
                    step = session.current_step,
                    "resumed session from disk"
                );
                if self.status()?.has_conflicts() {
                    DriverState::Conflicted
                } else {
                    DriverState::Running
                }
            }
            None => {
                if journal.is_some() {
                    warn!("found a splice journal but git has no operation in progress");
                }
                DriverState::Idle
            }
        };
        Ok(())
    }

    // === Accessors ===

    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.driver_state
    }

    #[must_use]
    pub const fn session(&self) -> Option<&OperationSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn repository(&self) -> &Repository {
        &self.repo
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for requesting cancellation from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn set_progress_sink(&mut self, sink: Box<dyn ProgressSink>) {
        self.reporter = ProgressReporter::new(sink);
        if let Some(session) = &self.session {
            self.reporter.resume(session.kind);
        }
    }

    // === Queries ===

    /// What git is in the middle of, read from disk.
    ///
    /// # Errors
    /// Returns error if sequencer state can't be read.
    pub fn operation_state(&self) -> Result<OperationState> {
        Ok(get_operation_state(&self.workdir)?)
    }

    /// Working-directory status.
    ///
    /// # Errors
    /// Returns error if git status fails.
    pub fn status(&self) -> Result<StatusResult> {
        Ok(get_status(&self.git, &self.workdir)?)
    }

    /// Conflicted files awaiting resolution.
    ///
    /// # Errors
    /// Returns error if git status fails.
    pub fn conflicts(&self) -> Result<Vec<ResolutionRequest>> {
        let status = self.status()?;
        Ok(resolution_requests(&self.workdir, &status))
    }

    /// Apply per-file resolutions, returning the paths to pass to
    /// [`Self::continue_operation`].
    ///
    /// # Errors
    /// Returns error if git fails to check out a side.
    pub fn resolve(&self, resolutions: &[(String, Resolution)]) -> Result<Vec<String>> {
        let requests = self.conflicts()?;
        apply_resolutions(&self.git, &self.workdir, &requests, resolutions)
    }

    // === Entry points that plan and begin ===

    /// Rebase `current` onto `target`.
    ///
    /// # Errors
    /// Returns error only for infrastructure failures; see [`Self::begin`].
    pub fn rebase(&mut self, target: &str, current: &str) -> Result<OperationResult> {
        let planned = plan::plan_rebase(&self.repo, target, current);
        self.begin_planned(OperationKind::Rebase, planned)
    }

    /// Squash `to_squash` onto `squash_onto`.
    ///
    /// # Errors
    /// Returns error only for infrastructure failures; see [`Self::begin`].
    pub fn squash(
        &mut self,
        to_squash: &[Commit],
        squash_onto: &Commit,
        last_retained: Option<&str>,
        message: &str,
    ) -> Result<OperationResult> {
        let planned = plan::plan_squash(&self.repo, to_squash, squash_onto, last_retained, message);
        self.begin_planned(OperationKind::Squash, planned)
    }

    /// Re-pick `order` at the position of the earliest of them.
    ///
    /// # Errors
    /// Returns error only for infrastructure failures; see [`Self::begin`].
    pub fn reorder(
        &mut self,
        order: &[Oid],
        last_retained: Option<&str>,
    ) -> Result<OperationResult> {
        let planned = plan::plan_reorder(&self.repo, order, last_retained);
        self.begin_planned(OperationKind::Reorder, planned)
    }

    /// Replace the message of `commit`.
    ///
    /// # Errors
    /// Returns error only for infrastructure failures; see [`Self::begin`].
    pub fn reword(&mut self, commit: &Commit, message: &str) -> Result<OperationResult> {
        let planned = plan::plan_reword(&self.repo, commit, message);
        self.begin_planned(OperationKind::Reword, planned)
    }

    /// Cherry-pick `commits` onto `target_branch`.
    ///
    /// # Errors
    /// Returns error only for infrastructure failures; see [`Self::begin`].
    pub fn cherry_pick(
        &mut self,
        commits: &[Commit],
        target_branch: &str,
    ) -> Result<OperationResult> {
        let planned = plan::plan_cherry_pick(&self.repo, commits, target_branch);
        self.begin_planned(OperationKind::CherryPick, planned)
    }

    fn begin_planned(
        &mut self,
        kind: OperationKind,
        planned: std::result::Result<OperationPlan, PlanError>,
    ) -> Result<OperationResult> {
        match planned {
            Ok(plan) => self.begin(plan),
            Err(e) => {
                warn!(%kind, error = %e, "invalid plan");
                self.reporter.reset(kind);
                let result = OperationResult::from(e);
                self.reporter.finish(&result);
                Ok(result)
            }
        }
    }

    // === Lifecycle ===

    /// Start executing `plan`.
    ///
    /// Precondition failures come back as [`OperationResult::Error`] without
    /// touching the repository.
    ///
    /// # Errors
    /// Returns error if git can't be run or splice's own state can't be
    /// written.
    pub fn begin(&mut self, plan: OperationPlan) -> Result<OperationResult> {
        self.reporter.reset(plan.kind());
        self.cancel.clear();

        let status = self.status()?;
        if let Some(failure) = self.check_preconditions(&plan, &status)? {
            warn!(kind = %plan.kind(), %failure, "refusing to start");
            let result = OperationResult::Error(failure);
            self.reporter.finish(&result);
            return Ok(result);
        }

        let journal = SessionJournal::for_plan(&plan, status.current_branch.clone());
        self.state.save_session(&journal)?;
        self.session = Some(OperationSession {
            kind: plan.kind(),
            branch: Some(plan.branch().to_string()),
            original_branch: status.current_branch,
            original_tip: Some(plan.expected_tip()),
            base_tip: plan.base().oid(),
            current_step: 0,
            total_steps: plan.total_steps(),
            message: plan.message().map(String::from),
            started_at: Some(journal.started_at),
        });
        self.driver_state = DriverState::Running;
        info!(
            kind = %plan.kind(),
            branch = plan.branch(),
            steps = plan.total_steps(),
            "starting operation"
        );

        let outcome = if plan.kind().is_rebase_family() {
            self.start_rebase(&plan)
        } else {
            self.start_cherry_pick(&plan)
        };
        self.settle(outcome)
    }

    fn check_preconditions(
        &self,
        plan: &OperationPlan,
        status: &StatusResult,
    ) -> Result<Option<Failure>> {
        let disk = self.operation_state()?;
        if !disk.is_none() {
            return Ok(Some(Precondition::OperationInProgress(disk.name()).into()));
        }
        if self.state.has_session() {
            return Ok(Some(Precondition::JournalPresent.into()));
        }
        if status.has_tracked_changes() {
            return Ok(Some(Precondition::DirtyWorkingTree.into()));
        }

        let Some(current) = &status.current_branch else {
            return Ok(Some(Precondition::DetachedHead.into()));
        };
        let branch_local = matches!(
            plan.kind(),
            OperationKind::Squash | OperationKind::Reorder | OperationKind::Reword
        );
        if branch_local && current != plan.branch() {
            return Ok(Some(
                Precondition::BranchNotCheckedOut {
                    expected: plan.branch().to_string(),
                    actual: current.clone(),
                }
                .into(),
            ));
        }

        let actual = match self.repo.branch_commit(plan.branch()) {
            Ok(oid) => oid,
            Err(splice_git::Error::BranchNotFound(name)) => {
                return Ok(Some(PlanError::UnresolvableRef(name).into()));
            }
            Err(e) => return Err(e.into()),
        };
        if actual != plan.expected_tip() {
            return Ok(Some(Failure::StaleTip {
                branch: plan.branch().to_string(),
                expected: plan.expected_tip(),
                actual,
            }));
        }

        Ok(None)
    }

    fn start_rebase(&mut self, plan: &OperationPlan) -> Result<OperationResult> {
        let todo = EditorFile::new(&plan.render_todo())?;
        let message = plan.message().map(EditorFile::new).transpose()?;
        let first_opens_editor = plan
            .steps()
            .iter()
            .find(|s| s.applies_commit())
            .is_some_and(Step::opens_editor);

        let empty = if plan.kind() == OperationKind::Rebase
            && self.config.rewrite.drop_emptied_commits
        {
            "--empty=drop"
        } else {
            "--empty=keep"
        };
        let base = plan.base().oid().map(|oid| oid.to_string());

        let mut args = vec![
            "-c",
            "rebase.autoSquash=false",
            "-c",
            "rebase.updateRefs=false",
            "-c",
            "rebase.missingCommitsCheck=ignore",
            "rebase",
            "-i",
            empty,
        ];
        match &base {
            Some(base) => args.push(base),
            None => args.push("--root"),
        }
        args.push(plan.branch());

        let options = ExecOptions::new()
            .env(GIT_SEQUENCE_EDITOR, todo.editor_command())
            .env(GIT_EDITOR, editor_for(first_opens_editor, message.as_ref()))
            .expect(GitErrorKind::MergeConflicts);
        let output = self.git.run(&args, &self.workdir, &options)?;

        self.drive_rebase(output, message.as_ref())
    }

    /// Step a rebase forward from wherever git last stopped.
    fn drive_rebase(
        &mut self,
        mut output: ExecOutput,
        message: Option<&EditorFile>,
    ) -> Result<OperationResult> {
        let mut last_stop = None;

        loop {
            if output.classified_error == Some(GitErrorKind::UnresolvedConflicts) {
                return self.outstanding();
            }

            let rebase = match self.operation_state()? {
                OperationState::None if output.classified_error.is_some() => {
                    return Ok(self.inconsistent(
                        "git reported conflicts but no rebase is in progress",
                    ));
                }
                OperationState::None => return self.complete(),
                OperationState::Rebase(rebase) => rebase,
                other => {
                    return Ok(self.inconsistent(format!(
                        "expected a rebase in progress, found {}",
                        other.name()
                    )));
                }
            };

            let progress = &rebase.progress;
            self.track_progress(
                progress.position,
                progress.total,
                progress.current().map(|l| l.summary.as_str()),
            );

            let status = self.status()?;
            if status.has_conflicts() {
                info!(
                    step = progress.position,
                    files = status.conflicted().count(),
                    "step stopped with conflicts"
                );
                self.driver_state = DriverState::Conflicted;
                return Ok(OperationResult::ConflictsEncountered);
            }

            if !progress.stopped_at_break() {
                return Ok(self.inconsistent(format!(
                    "rebase stopped at step {} without conflicts",
                    progress.position
                )));
            }
            if last_stop == Some(progress.position) {
                return Ok(self.inconsistent(format!(
                    "rebase made no progress past step {}",
                    progress.position
                )));
            }
            last_stop = Some(progress.position);

            if self.cancel.is_cancelled() {
                info!(step = progress.position, "cancel requested, aborting");
                self.abort()?;
                return Ok(OperationResult::Error(Failure::Cancelled));
            }

            output = self.continue_rebase(&rebase, message)?;
        }
    }

    /// `git rebase --continue` from a clean `break` stop.
    fn continue_rebase(
        &self,
        rebase: &RebaseState,
        message: Option<&EditorFile>,
    ) -> Result<ExecOutput> {
        let next_opens_editor = rebase
            .progress
            .next()
            .is_some_and(|l| opens_editor(l.action));
        let options = ExecOptions::new()
            .env(GIT_EDITOR, editor_for(next_opens_editor, message))
            .expect(GitErrorKind::MergeConflicts)
            .expect(GitErrorKind::UnresolvedConflicts);
        Ok(self.git.run(&["rebase", "--continue"], &self.workdir, &options)?)
    }

    fn start_cherry_pick(&mut self, plan: &OperationPlan) -> Result<OperationResult> {
        if self.repo.current_branch().ok().as_deref() != Some(plan.branch()) {
            self.git
                .run(&["checkout", plan.branch(), "--"], &self.workdir, &ExecOptions::new())?;
        }

        let mut args = vec!["cherry-pick", "--allow-empty", "--allow-empty-message"];
        if self.config.rewrite.keep_redundant_commits {
            args.push("--keep-redundant-commits");
        }
        if plan.has_merges() {
            args.extend(["-m", "1"]);
        }
        let shas: Vec<String> = plan
            .steps()
            .iter()
            .map(|s| s.commit().sha.to_string())
            .collect();
        args.extend(shas.iter().map(String::as_str));

        let options = ExecOptions::new()
            .env(GIT_EDITOR, KeepMessage.editor_command())
            .expect(GitErrorKind::MergeConflicts);
        let output = self.git.run(&args, &self.workdir, &options)?;

        self.drive_cherry_pick(&output)
    }

    fn drive_cherry_pick(&mut self, output: &ExecOutput) -> Result<OperationResult> {
        if output.classified_error == Some(GitErrorKind::UnresolvedConflicts) {
            return self.outstanding();
        }

        let pick = match self.operation_state()? {
            OperationState::None if output.classified_error.is_some() => {
                return Ok(self.inconsistent(
                    "git reported conflicts but no cherry-pick is in progress",
                ));
            }
            OperationState::None => return self.complete(),
            OperationState::CherryPick(pick) => pick,
            other => {
                return Ok(self.inconsistent(format!(
                    "expected a cherry-pick in progress, found {}",
                    other.name()
                )));
            }
        };

        let remaining = pick.remaining.len().max(1);
        let total = self
            .session
            .as_ref()
            .map_or(remaining, |s| s.total_steps.max(remaining));
        self.track_progress(
            total - remaining + 1,
            total,
            pick.remaining.first().map(|l| l.summary.as_str()),
        );

        let status = self.status()?;
        if status.has_conflicts() {
            info!(files = status.conflicted().count(), "cherry-pick stopped with conflicts");
            self.driver_state = DriverState::Conflicted;
            return Ok(OperationResult::ConflictsEncountered);
        }

        Ok(self.inconsistent("cherry-pick stopped without conflicts"))
    }

    /// Resume after the caller resolved conflicts.
    ///
    /// `resolved` must name every conflicted file and every tracked file with
    /// unstaged changes; otherwise nothing is staged and
    /// [`OperationResult::OutstandingFilesNotStaged`] is returned. Untracked
    /// paths in the list are ignored.
    ///
    /// # Errors
    /// Returns error if no operation is in progress that splice can resume,
    /// or for infrastructure failures.
    pub fn continue_operation<S: AsRef<str>>(&mut self, resolved: &[S]) -> Result<OperationResult> {
        if self.driver_state == DriverState::Failed {
            return Ok(Precondition::FailedOperation.into());
        }

        let disk = self.operation_state()?;
        match &disk {
            OperationState::None if self.session.is_some() || self.state.has_session() => {
                return Ok(self.inconsistent(
                    "splice has an operation recorded but git has none in progress",
                ));
            }
            OperationState::None => return Ok(Precondition::NothingInProgress.into()),
            OperationState::Merge { .. } => return Err(Error::ForeignOperation("merge")),
            OperationState::Rebase(_) | OperationState::CherryPick(_) => {}
        }
        if self.session.is_none() {
            self.refresh()?;
        }

        let outcome = self.continue_inner(&disk, resolved);
        self.settle(outcome)
    }

    fn continue_inner<S: AsRef<str>>(
        &mut self,
        disk: &OperationState,
        resolved: &[S],
    ) -> Result<OperationResult> {
        self.driver_state = DriverState::Resolving;

        let status = self.status()?;
        let resolved: HashSet<&str> = resolved.iter().map(|path| path.as_ref()).collect();

        let outstanding: Vec<&str> = status
            .files
            .iter()
            .filter(|f| f.is_conflicted() || (!f.is_untracked() && f.unstaged.is_some()))
            .map(|f| f.path.as_str())
            .filter(|path| !resolved.contains(path))
            .collect();
        if !outstanding.is_empty() {
            info!(files = ?outstanding, "files still need resolving");
            self.driver_state = if status.has_conflicts() {
                DriverState::Conflicted
            } else {
                DriverState::Running
            };
            return Ok(OperationResult::OutstandingFilesNotStaged);
        }

        let to_stage: Vec<&str> = status
            .files
            .iter()
            .filter(|f| !f.is_untracked() && resolved.contains(f.path.as_str()))
            .map(|f| f.path.as_str())
            .collect();
        if !to_stage.is_empty() {
            let mut args = vec!["add", "--all", "--"];
            args.extend(to_stage);
            self.git.run(&args, &self.workdir, &ExecOptions::new())?;
        }

        match disk {
            OperationState::Rebase(rebase) => self.resume_rebase(rebase),
            _ => self.resume_cherry_pick(),
        }
    }

    fn resume_rebase(&mut self, rebase: &RebaseState) -> Result<OperationResult> {
        let message = self
            .session
            .as_ref()
            .and_then(|s| s.message.as_deref())
            .map(EditorFile::new)
            .transpose()?;

        let output = if rebase.progress.stopped_at_break() {
            self.continue_rebase(rebase, message.as_ref())?
        } else {
            let (verb, opens) = if self.has_staged_changes()? {
                let current_opens = rebase
                    .progress
                    .current()
                    .is_some_and(|l| opens_editor(l.action));
                ("--continue", current_opens)
            } else {
                warn!(
                    step = rebase.progress.position,
                    "resolution left nothing to commit, skipping step"
                );
                let next_opens = rebase
                    .progress
                    .next()
                    .is_some_and(|l| opens_editor(l.action));
                ("--skip", next_opens)
            };
            let options = ExecOptions::new()
                .env(GIT_EDITOR, editor_for(opens, message.as_ref()))
                .expect(GitErrorKind::MergeConflicts)
                .expect(GitErrorKind::UnresolvedConflicts);
            self.git.run(&["rebase", verb], &self.workdir, &options)?
        };

        self.driver_state = DriverState::Running;
        self.drive_rebase(output, message.as_ref())
    }

    fn resume_cherry_pick(&mut self) -> Result<OperationResult> {
        let verb = if self.has_staged_changes()? {
            "--continue"
        } else {
            warn!("resolution left nothing to commit, skipping commit");
            "--skip"
        };
        let options = ExecOptions::new()
            .env(GIT_EDITOR, KeepMessage.editor_command())
            .expect(GitErrorKind::MergeConflicts)
            .expect(GitErrorKind::UnresolvedConflicts);
        let output = self.git.run(&["cherry-pick", verb], &self.workdir, &options)?;

        self.driver_state = DriverState::Running;
        self.drive_cherry_pick(&output)
    }

    /// Abort the operation in progress and return to the original branch.
    ///
    /// # Errors
    /// Returns the git error when nothing is in progress, and
    /// [`Error::ForeignOperation`] for a merge splice didn't start.
    pub fn abort(&mut self) -> Result<()> {
        let disk = self.operation_state()?;
        let journal = self.state.load_session()?;
        let session = self
            .session
            .take()
            .or_else(|| reconstruct_session(&disk, journal.as_ref()));

        match &disk {
            OperationState::Rebase(_) => {
                self.git.run(&["rebase", "--abort"], &self.workdir, &ExecOptions::new())?;
            }
            OperationState::CherryPick(_) => {
                self.git.run(&["cherry-pick", "--abort"], &self.workdir, &ExecOptions::new())?;
            }
            OperationState::Merge { .. } => return Err(Error::ForeignOperation("merge")),
            OperationState::None if journal.is_some() => {
                warn!("clearing journal left without a git operation");
                self.state.clear_session()?;
                self.driver_state = DriverState::Aborted;
                return Ok(());
            }
            OperationState::None => {
                self.git.run(&["rebase", "--abort"], &self.workdir, &ExecOptions::new())?;
                return Ok(());
            }
        }

        if let Some(original) = session.as_ref().and_then(|s| s.original_branch.as_deref()) {
            if self.repo.current_branch().ok().as_deref() != Some(original) {
                debug!(branch = original, "returning to original branch");
                self.git
                    .run(&["checkout", original, "--"], &self.workdir, &ExecOptions::new())?;
            }
        }

        self.state.clear_session()?;
        self.driver_state = DriverState::Aborted;
        self.reporter.finish(&OperationResult::Error(Failure::Cancelled));
        info!("operation aborted");
        Ok(())
    }

    /// Move the branch of the last completed operation back to where it was.
    ///
    /// # Errors
    /// Returns [`Error::NothingToUndo`] without a record, or infrastructure
    /// failures.
    pub fn undo_last(&mut self) -> Result<OperationResult> {
        let Some(record) = self.state.load_undo()? else {
            return Err(Error::NothingToUndo);
        };

        let disk = self.operation_state()?;
        if !disk.is_none() {
            return Ok(Precondition::OperationInProgress(disk.name()).into());
        }
        let status = self.status()?;
        match status.current_branch.as_deref() {
            None => return Ok(Precondition::DetachedHead.into()),
            Some(current) if current != record.branch => {
                return Ok(Precondition::BranchNotCheckedOut {
                    expected: record.branch.clone(),
                    actual: current.to_string(),
                }
                .into());
            }
            Some(_) => {}
        }
        if status.has_tracked_changes() {
            return Ok(Precondition::DirtyWorkingTree.into());
        }

        let expected = record.after()?;
        let actual = self.repo.branch_commit(&record.branch)?;
        if actual != expected {
            return Ok(Failure::StaleTip {
                branch: record.branch.clone(),
                expected,
                actual,
            }
            .into());
        }

        let before = record.before()?.to_string();
        let outcome = self
            .git
            .run(&["reset", "--hard", &before], &self.workdir, &ExecOptions::new())
            .map_err(Error::from);
        if let Err(e) = outcome {
            return self.settle(Err(e));
        }

        self.state.clear_undo()?;
        info!(kind = %record.kind, branch = %record.branch, tip = %before, "undid last operation");
        Ok(OperationResult::CompletedWithoutError)
    }

    // === Helpers ===

    fn has_staged_changes(&self) -> Result<bool> {
        let output = self.git.run(
            &["diff", "--cached", "--quiet"],
            &self.workdir,
            &ExecOptions::new().success_codes([0, 1]),
        )?;
        Ok(output.exit_code == 1)
    }

    fn track_progress(&mut self, position: usize, total: usize, summary: Option<&str>) {
        if let Some(session) = self.session.as_mut() {
            session.current_step = position;
            session.total_steps = total;
        }
        self.reporter.report(position, total, summary);
    }

    fn complete(&mut self) -> Result<OperationResult> {
        let session = self.session.take();
        self.state.clear_session()?;

        if let Some(session) = &session {
            self.reporter.report(session.total_steps, session.total_steps, None);
            if self.config.rewrite.record_undo {
                self.record_undo(session)?;
            }
        }

        self.driver_state = DriverState::Completed;
        info!("operation completed");
        Ok(OperationResult::CompletedWithoutError)
    }

    fn record_undo(&self, session: &OperationSession) -> Result<()> {
        let (Some(branch), Some(before)) = (session.branch.as_deref(), session.original_tip) else {
            return Ok(());
        };
        let after = self.repo.branch_commit(branch)?;
        self.state
            .save_undo(&UndoRecord::new(session.kind, branch, before, after))
    }

    fn outstanding(&mut self) -> Result<OperationResult> {
        self.driver_state = if self.status()?.has_conflicts() {
            DriverState::Conflicted
        } else {
            DriverState::Running
        };
        Ok(OperationResult::OutstandingFilesNotStaged)
    }

    fn inconsistent(&mut self, message: impl Into<String>) -> OperationResult {
        let message = message.into();
        error!(%message, "inconsistent repository state");
        self.driver_state = DriverState::Failed;
        OperationResult::Error(Failure::Inconsistent(message))
    }

    /// Drop the session of an operation git never got going, returning to
    /// the original branch if splice switched away from it.
    fn release_unstarted(&mut self) -> Result<()> {
        if !self.operation_state()?.is_none() {
            return Ok(());
        }
        if let Some(session) = self.session.take() {
            self.restore_original_branch(&session)?;
        }
        self.state.clear_session()
    }

    fn restore_original_branch(&self, session: &OperationSession) -> Result<()> {
        let (Some(original), Some(branch)) = (
            session.original_branch.as_deref(),
            session.branch.as_deref(),
        ) else {
            return Ok(());
        };
        let current = self.repo.current_branch().ok();
        if current.as_deref() == Some(original) || current.as_deref() != Some(branch) {
            return Ok(());
        }
        let tip = self.repo.branch_commit(branch).ok();
        if session.original_tip.is_some() && tip != session.original_tip {
            return Ok(());
        }

        info!(branch = original, "returning to original branch");
        self.git
            .run(&["checkout", original, "--"], &self.workdir, &ExecOptions::new())?;
        Ok(())
    }

    /// Turn unexpected git failures into terminal results and emit the
    /// terminal result once.
    fn settle(&mut self, outcome: Result<OperationResult>) -> Result<OperationResult> {
        let result = match outcome {
            Ok(result) => result,
            Err(Error::Git(splice_git::Error::GitFailed {
                args,
                exit_code,
                stdout,
                stderr,
                ..
            })) => {
                error!(args = %args.join(" "), exit_code, stderr = %stderr.trim(), "git failed");
                self.driver_state = DriverState::Failed;
                OperationResult::Error(Failure::Git(GitFailure {
                    args,
                    exit_code,
                    stdout,
                    stderr,
                }))
            }
            Err(e) => {
                self.driver_state = DriverState::Failed;
                if let Err(cleanup) = self.release_unstarted() {
                    warn!(error = %cleanup, "could not clean up after failed operation");
                }
                return Err(e);
            }
        };

        if self.driver_state == DriverState::Failed {
            self.release_unstarted()?;
        }

        if result.is_terminal() {
            self.reporter.finish(&result);
        }
        Ok(result)
    }
}

const fn opens_editor(action: TodoAction) -> bool {
    matches!(action, TodoAction::Squash | TodoAction::Reword)
}

/// The message file's editor for steps that ask for a message, otherwise
/// one that keeps git's message.
fn editor_for(opens_editor: bool, message: Option<&EditorFile>) -> String {
    match message {
        Some(file) if opens_editor => file.editor_command(),
        _ => KeepMessage.editor_command(),
    }
}
