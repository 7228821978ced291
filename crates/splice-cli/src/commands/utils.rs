use anyhow::{Context, Result, bail};
use splice_core::{OperationDriver, OperationResult};
use splice_git::Commit;
use tracing::debug;

use crate::output;
use crate::progress::BarSink;

/// The operation stopped for the user; details were already printed.
#[derive(Debug, thiserror::Error)]
#[error("operation stopped with conflicts")]
pub struct Stopped;

/// Open the driver for the current directory with a progress bar attached.
pub fn open_driver() -> Result<OperationDriver> {
    let mut driver = OperationDriver::open(".").context("Not inside a git repository")?;
    debug!(workdir = %driver.workdir().display(), state = ?driver.state(), "opened repository");
    driver.set_progress_sink(Box::new(BarSink::new()));
    Ok(driver)
}

/// Resolve revisions to commits.
pub fn resolve_commits(driver: &OperationDriver, specs: &[String]) -> Result<Vec<Commit>> {
    specs.iter().map(|spec| resolve_commit(driver, spec)).collect()
}

pub fn resolve_commit(driver: &OperationDriver, spec: &str) -> Result<Commit> {
    let repo = driver.repository();
    let oid = repo
        .resolve_commit(spec)
        .with_context(|| format!("Unknown revision '{spec}'"))?;
    Ok(repo.find_commit(oid)?)
}

/// Print the outcome of a rewrite; anything other than completion is an error.
pub fn report(driver: &OperationDriver, result: &OperationResult, done: &str) -> Result<()> {
    debug!(?result, "operation returned");
    match result {
        OperationResult::CompletedWithoutError => {
            output::success(done);
            Ok(())
        }
        OperationResult::ConflictsEncountered => {
            if let Some(session) = driver.session() {
                output::warn(&format!(
                    "{} stopped at step {}/{} with conflicts:",
                    session.kind, session.current_step, session.total_steps
                ));
            } else {
                output::warn("Stopped with conflicts:");
            }
            for request in driver.conflicts()? {
                output::detail(&format!("  {} ({})", request.path, request.kind));
            }
            output::detail("");
            output::detail("Resolve them, then run `splice continue <paths>` or `splice abort`.");
            Err(Stopped.into())
        }
        OperationResult::OutstandingFilesNotStaged => {
            let pending: Vec<String> = driver
                .status()?
                .files
                .into_iter()
                .filter(|f| f.is_conflicted() || (!f.is_untracked() && f.unstaged.is_some()))
                .map(|f| f.path)
                .collect();
            output::warn("Some files are not resolved yet:");
            for path in &pending {
                output::detail(&format!("  {path}"));
            }
            bail!("Pass every resolved file to `splice continue`, or use --all")
        }
        OperationResult::Error(failure) => bail!("{failure}"),
    }
}
