//! # splice-core
//!
//! History rewriting for splice. Builds validated plans for rebase, squash,
//! reorder, reword and cherry-pick, then drives them through git's sequencer
//! one step at a time, stopping for conflicts and resuming or aborting on
//! request.

mod cancel;
pub mod config;
pub mod conflict;
mod driver;
mod error;
pub mod message;
mod outcome;
pub mod plan;
pub mod progress;
mod session;
pub mod state;

#[cfg(test)]
mod test_mocks;

pub use cancel::CancelHandle;
pub use config::Config;
pub use conflict::{Resolution, ResolutionRequest};
pub use driver::{DriverState, OperationDriver};
pub use error::{Error, Result};
pub use outcome::{Failure, GitFailure, OperationResult, PlanError, Precondition};
pub use plan::{Base, OperationKind, OperationPlan, Step};
pub use progress::{NoProgress, Progress, ProgressSink};
pub use session::{OperationSession, SessionJournal, reconstruct_session};
pub use state::{State, UndoRecord};
