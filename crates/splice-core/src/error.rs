//! Error types for splice-core.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop an engine call outright.
///
/// Outcomes of a rewrite (conflicts, invalid plans, git refusing a step) are
/// reported through [`crate::OperationResult`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a Git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepository,

    /// No undo record exists.
    #[error("nothing to undo")]
    NothingToUndo,

    /// The repository is in the middle of something splice didn't start.
    #[error("a {0} is in progress that splice did not start - finish it with git first")]
    ForeignOperation(&'static str),

    /// State file parsing error.
    #[error("failed to parse {file}: {message}")]
    StateParseError { file: PathBuf, message: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] splice_git::Error),
}
