//! `splice continue` and `splice abort`.

use anyhow::{Result, bail};
use splice_core::Resolution;

use crate::commands::utils;
use crate::output;

/// Resume after conflicts, optionally settling files by taking one side.
pub fn run_continue(paths: &[String], all: bool, ours: bool, theirs: bool) -> Result<()> {
    let mut driver = utils::open_driver()?;

    let mut resolved: Vec<String> = if all {
        driver
            .status()?
            .files
            .into_iter()
            .filter(|f| !f.is_untracked())
            .map(|f| f.path)
            .collect()
    } else {
        paths.to_vec()
    };

    let side = match (ours, theirs) {
        (true, _) => Some(Resolution::Ours),
        (_, true) => Some(Resolution::Theirs),
        _ => None,
    };
    if let Some(side) = side {
        if resolved.is_empty() {
            bail!("Name the files to resolve, or use --all");
        }
        let resolutions: Vec<(String, Resolution)> =
            resolved.iter().map(|path| (path.clone(), side)).collect();
        resolved = driver.resolve(&resolutions)?;
    }

    let result = driver.continue_operation(&resolved)?;
    utils::report(&driver, &result, "Operation complete")
}

pub fn run_abort() -> Result<()> {
    let mut driver = utils::open_driver()?;
    driver.abort()?;
    output::success("Aborted");
    Ok(())
}
