//! Outcome of an engine call.

use splice_git::Oid;

/// Why a plan could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("no commits were given")]
    EmptyOperandSet,

    #[error("the squash destination {0} is also in the set of commits to squash")]
    DestinationInSquashSet(Oid),

    #[error("could not resolve '{0}' to a commit")]
    UnresolvableRef(String),

    #[error("commit {0} is not part of the rewritten range")]
    NotInRange(Oid),

    #[error("commit {0} was given more than once")]
    DuplicateCommit(Oid),

    #[error("{0} is not an ancestor of the branch tip")]
    NotAnAncestor(Oid),

    #[error("the range contains merge commit {0}, which cannot be rewritten")]
    MergeInRange(Oid),

    #[error("the range between the base and the branch tip is empty")]
    EmptyRange,

    #[error("a commit message is required")]
    EmptyMessage,

    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    #[error("failed to read repository: {0}")]
    Repository(String),
}

/// A condition that must hold before an operation may start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("a {0} is already in progress")]
    OperationInProgress(&'static str),

    #[error("a previous splice operation left a journal behind - run `splice abort`")]
    JournalPresent,

    #[error("working directory has uncommitted changes to tracked files")]
    DirtyWorkingTree,

    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    #[error("branch '{expected}' must be checked out (currently on {actual})")]
    BranchNotCheckedOut { expected: String, actual: String },

    #[error("no operation is in progress")]
    NothingInProgress,

    #[error("the previous operation failed - run `splice abort` first")]
    FailedOperation,
}

/// A git invocation that failed in a way the engine did not anticipate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("git {} failed with exit code {exit_code}: {}", .args.join(" "), .stderr.trim())]
pub struct GitFailure {
    pub args: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Reason carried by [`OperationResult::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error("branch '{branch}' moved since the plan was built (expected {expected}, found {actual})")]
    StaleTip {
        branch: String,
        expected: Oid,
        actual: Oid,
    },

    #[error(transparent)]
    Git(#[from] GitFailure),

    #[error("inconsistent repository state: {0}")]
    Inconsistent(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Closed set of outcomes reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum OperationResult {
    CompletedWithoutError,
    ConflictsEncountered,
    OutstandingFilesNotStaged,
    Error(Failure),
}

impl OperationResult {
    /// Whether the operation has ended, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::CompletedWithoutError | Self::Error(_))
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<Failure> for OperationResult {
    fn from(failure: Failure) -> Self {
        Self::Error(failure)
    }
}

impl From<PlanError> for OperationResult {
    fn from(error: PlanError) -> Self {
        Self::Error(Failure::InvalidPlan(error))
    }
}

impl From<Precondition> for OperationResult {
    fn from(precondition: Precondition) -> Self {
        Self::Error(Failure::Precondition(precondition))
    }
}
