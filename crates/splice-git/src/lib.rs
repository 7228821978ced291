//! # splice-git
//!
//! Git plumbing for splice: a blocking executor for the `git` command line,
//! parsers for working-directory status and in-progress sequencer state, and
//! read-only repository queries built on git2-rs.

mod commit;
mod error;
pub mod exec;
mod repository;
pub mod state;
pub mod status;
mod traits;

pub use commit::{Commit, Identity, Trailer};
pub use error::{Error, Result};
pub use exec::{ExecOptions, ExecOutput, GitCli, GitErrorKind, GitExecutor};
pub use git2::Oid;
pub use repository::Repository;
pub use state::{
    CherryPickState, OperationState, RebaseProgress, RebaseState, TodoAction, TodoLine,
    get_operation_state,
};
pub use status::{
    ChangeKind, ConflictKind, ConflictStages, FileStatus, StatusEntry, StatusResult,
    SubmoduleStatus, get_conflicted_files, get_status,
};
pub use traits::GitOps;
