//! Command-line surface.

use clap::{Parser, Subcommand};

pub mod resume;
pub mod rewrite;
pub mod status;
pub mod undo;
pub mod utils;

/// Rewrite commit history one resumable step at a time.
#[derive(Debug, Parser)]
#[command(name = "splice", version, about, long_about = None)]
pub struct Cli {
    /// Only print errors and essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log debug output to stderr (overrides SPLICE_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the operation in progress and any conflicted files.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Replay a branch's commits on top of another ref.
    Rebase {
        /// Ref to rebase onto.
        target: String,

        /// Branch to rebase (defaults to the current branch).
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Fold commits into another commit on the current branch.
    Squash {
        /// Commit the others are folded into.
        onto: String,

        /// Commits to fold in.
        #[arg(required = true)]
        commits: Vec<String>,

        /// Newest commit to leave untouched (defaults to rewriting from the root).
        #[arg(long)]
        base: Option<String>,

        /// Message for the combined commit.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Move commits, in the given order, to where the earliest of them is.
    Reorder {
        /// Commits to move, oldest first.
        #[arg(required = true)]
        commits: Vec<String>,

        /// Newest commit to leave untouched (defaults to rewriting from the root).
        #[arg(long)]
        base: Option<String>,
    },

    /// Replace the message of a commit on the current branch.
    Reword {
        commit: String,

        /// New message.
        #[arg(short, long)]
        message: String,
    },

    /// Apply commits on top of another branch.
    #[command(name = "cherry-pick")]
    CherryPick {
        /// Commits to apply, in order.
        #[arg(required = true)]
        commits: Vec<String>,

        /// Branch to apply them to.
        #[arg(long)]
        onto: String,
    },

    /// Resume after resolving conflicts.
    Continue {
        /// Files you resolved.
        paths: Vec<String>,

        /// Treat every conflicted and modified file as resolved.
        #[arg(short, long)]
        all: bool,

        /// Resolve the given files by taking our side.
        #[arg(long, conflicts_with = "theirs")]
        ours: bool,

        /// Resolve the given files by taking their side.
        #[arg(long)]
        theirs: bool,
    },

    /// Abandon the operation in progress.
    Abort,

    /// Restore the branch rewritten by the last completed operation.
    Undo,
}
