//! Blocking executor for the `git` command line.
//!
//! Every repository mutation goes through [`GitExecutor::run`]. A non-success
//! exit is classified against known stderr signatures; classifications the
//! caller lists in [`ExecOptions::expected_errors`] come back as data, anything
//! else becomes [`Error::GitFailed`].

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Known failure signatures git reports on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitErrorKind {
    /// A step stopped because the merge produced conflicts.
    MergeConflicts,
    /// A continue was attempted while conflicted files remain unstaged.
    UnresolvedConflicts,
    /// A revision or ref could not be resolved.
    BadRevision,
    /// The working directory is not inside a repository.
    NotAGitRepository,
    /// Another process holds the config lock.
    ConfigLockFileAlreadyExists,
    /// Another process holds the index lock.
    IndexLocked,
    /// Local changes would be overwritten by a checkout or merge.
    LocalChangesOverwritten,
    /// `rebase --continue/--abort/--skip` with no rebase in progress.
    NoRebaseInProgress,
    /// `cherry-pick --continue/--abort/--skip` with no cherry-pick in progress.
    NoCherryPickInProgress,
    /// A rebase is already in progress.
    RebaseInProgress,
    /// A cherry-pick is already in progress.
    CherryPickInProgress,
    /// A commit was requested with nothing staged.
    NothingToCommit,
    /// A cherry-picked commit became empty.
    EmptyCherryPick,
    /// The operation refuses to start with uncommitted changes.
    DirtyWorkingTree,
}

/// Ordered signature table. Earlier entries win, so more specific messages
/// come before generic ones such as "could not apply".
const SIGNATURES: &[(&str, GitErrorKind)] = &[
    ("not a git repository", GitErrorKind::NotAGitRepository),
    ("could not lock config file", GitErrorKind::ConfigLockFileAlreadyExists),
    ("index.lock': File exists", GitErrorKind::IndexLocked),
    ("would be overwritten by", GitErrorKind::LocalChangesOverwritten),
    ("You must edit all merge conflicts", GitErrorKind::UnresolvedConflicts),
    (
        "Committing is not possible because you have unmerged files",
        GitErrorKind::UnresolvedConflicts,
    ),
    ("you need to resolve your current index first", GitErrorKind::UnresolvedConflicts),
    ("No rebase in progress?", GitErrorKind::NoRebaseInProgress),
    ("no cherry-pick or revert in progress", GitErrorKind::NoCherryPickInProgress),
    ("It seems that there is already a rebase-merge directory", GitErrorKind::RebaseInProgress),
    ("It seems that there is already a rebase-apply directory", GitErrorKind::RebaseInProgress),
    ("cherry-pick is already in progress", GitErrorKind::CherryPickInProgress),
    ("The previous cherry-pick is now empty", GitErrorKind::EmptyCherryPick),
    ("cannot rebase: You have unstaged changes", GitErrorKind::DirtyWorkingTree),
    ("Your index contains uncommitted changes", GitErrorKind::DirtyWorkingTree),
    ("Please commit or stash them", GitErrorKind::DirtyWorkingTree),
    ("CONFLICT (", GitErrorKind::MergeConflicts),
    ("could not apply", GitErrorKind::MergeConflicts),
    ("after resolving the conflicts, mark the corrected paths", GitErrorKind::MergeConflicts),
    ("nothing to commit", GitErrorKind::NothingToCommit),
    ("bad revision", GitErrorKind::BadRevision),
    ("unknown revision", GitErrorKind::BadRevision),
    ("Needed a single revision", GitErrorKind::BadRevision),
    ("invalid upstream", GitErrorKind::BadRevision),
    ("not a valid commit name", GitErrorKind::BadRevision),
    ("bad object", GitErrorKind::BadRevision),
];

impl GitErrorKind {
    /// Classify git output against the known signatures.
    #[must_use]
    pub fn classify(output: &str) -> Option<Self> {
        SIGNATURES
            .iter()
            .find(|(needle, _)| output.contains(needle))
            .map(|(_, kind)| *kind)
    }
}

/// Per-invocation options.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Extra environment for this invocation only.
    pub env: BTreeMap<String, String>,
    /// Bytes written to git's stdin.
    pub stdin: Option<Vec<u8>>,
    /// Classified failures returned as data instead of errors.
    pub expected_errors: HashSet<GitErrorKind>,
    /// Exit codes treated as success.
    pub success_exit_codes: HashSet<i32>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            stdin: None,
            expected_errors: HashSet::new(),
            success_exit_codes: HashSet::from([0]),
        }
    }
}

impl ExecOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for this invocation.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Feed bytes to stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Accept a classified failure as a regular outcome.
    #[must_use]
    pub fn expect(mut self, kind: GitErrorKind) -> Self {
        self.expected_errors.insert(kind);
        self
    }

    /// Replace the set of exit codes treated as success.
    #[must_use]
    pub fn success_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.success_exit_codes = codes.into_iter().collect();
        self
    }
}

/// Captured result of a git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Set when the exit was a failure the caller expected.
    pub classified_error: Option<GitErrorKind>,
}

impl ExecOutput {
    /// Whether git exited with one of the success codes.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.classified_error.is_none()
    }
}

/// Process boundary for running git.
pub trait GitExecutor {
    /// Run git with `args` in `cwd`, blocking until the process exits and
    /// all of its output has been read.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if git cannot be started and
    /// [`Error::GitFailed`] for failures not listed in `options`.
    fn run(&self, args: &[&str], cwd: &Path, options: &ExecOptions) -> Result<ExecOutput>;
}

impl<T: GitExecutor + ?Sized> GitExecutor for &T {
    fn run(&self, args: &[&str], cwd: &Path, options: &ExecOptions) -> Result<ExecOutput> {
        (**self).run(args, cwd, options)
    }
}

/// [`GitExecutor`] that spawns the git executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    env: BTreeMap<String, String>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Use `git` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a specific git executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            env: BTreeMap::new(),
        }
    }

    /// Extra environment applied to every invocation.
    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x0800_0000);
        }

        cmd.current_dir(cwd)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(&self.env);
        cmd
    }
}

impl GitExecutor for GitCli {
    fn run(&self, args: &[&str], cwd: &Path, options: &ExecOptions) -> Result<ExecOutput> {
        debug!(args = %args.join(" "), cwd = %cwd.display(), "running git");

        let mut cmd = self.command(cwd);
        cmd.args(args)
            .envs(&options.env)
            .stdin(if options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        // Written on its own thread so a large input can't deadlock against
        // git filling its stdout pipe.
        let writer = match (options.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                Some(std::thread::spawn(move || pipe.write_all(&input)))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                Err(_) => return Err(std::io::Error::other("stdin writer panicked").into()),
                _ => {}
            }
        }

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if options.success_exit_codes.contains(&exit_code) {
            trace!(exit_code, "git succeeded");
            return Ok(ExecOutput {
                exit_code,
                stdout,
                stderr,
                classified_error: None,
            });
        }

        let kind = GitErrorKind::classify(&stderr).or_else(|| GitErrorKind::classify(&stdout));
        debug!(exit_code, ?kind, "git exited with failure");

        if let Some(kind) = kind.filter(|k| options.expected_errors.contains(k)) {
            return Ok(ExecOutput {
                exit_code,
                stdout,
                stderr,
                classified_error: Some(kind),
            });
        }

        Err(Error::GitFailed {
            args: args.iter().map(ToString::to_string).collect(),
            exit_code,
            stdout,
            stderr,
            kind,
        })
    }
}
