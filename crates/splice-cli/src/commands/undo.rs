//! `splice undo` command - Undo the last completed operation.

use anyhow::Result;

use crate::commands::utils;

/// Run the undo command.
pub fn run() -> Result<()> {
    let mut driver = utils::open_driver()?;
    let result = driver.undo_last()?;
    utils::report(&driver, &result, "Undo complete")
}
