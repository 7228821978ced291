//! splice CLI - rewrite commit history one resumable step at a time.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod progress;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    output::set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Status { json } => commands::status::run(json),
        Commands::Rebase { target, branch } => {
            commands::rewrite::rebase(&target, branch.as_deref())
        }
        Commands::Squash {
            onto,
            commits,
            base,
            message,
        } => commands::rewrite::squash(&onto, &commits, base.as_deref(), message.as_deref()),
        Commands::Reorder { commits, base } => {
            commands::rewrite::reorder(&commits, base.as_deref())
        }
        Commands::Reword { commit, message } => commands::rewrite::reword(&commit, &message),
        Commands::CherryPick { commits, onto } => commands::rewrite::cherry_pick(&commits, &onto),
        Commands::Continue {
            paths,
            all,
            ours,
            theirs,
        } => commands::resume::run_continue(&paths, all, ours, theirs),
        Commands::Abort => commands::resume::run_abort(),
        Commands::Undo => commands::undo::run(),
    };

    if let Err(e) = result {
        if !e.is::<commands::utils::Stopped>() {
            output::error(&e.to_string());
        }
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `SPLICE_LOG` (default `warn`).
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SPLICE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
