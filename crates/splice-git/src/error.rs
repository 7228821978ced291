//! Error types for splice-git.

use crate::exec::GitErrorKind;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or driving a git repository.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a git repository.
    #[error("not a git repository")]
    NotARepository,

    /// The repository has no working directory.
    #[error("bare repositories are not supported")]
    BareRepository,

    /// Branch not found.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Reference or revision could not be resolved.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// The git executable could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// git exited unsuccessfully with an error the caller did not expect.
    #[error("git {} failed with exit code {exit_code}: {}", .args.join(" "), .stderr.trim())]
    GitFailed {
        args: Vec<String>,
        exit_code: i32,
        stdout: String,
        stderr: String,
        kind: Option<GitErrorKind>,
    },

    /// Output or on-disk state that could not be parsed.
    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    /// Filesystem error while reading repository state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}

impl Error {
    pub(crate) fn parse(what: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            what,
            message: message.into(),
        }
    }
}
