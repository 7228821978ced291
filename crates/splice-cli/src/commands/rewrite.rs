//! `splice rebase|squash|reorder|reword|cherry-pick` - start a rewrite.

use anyhow::{Context, Result};

use crate::commands::utils;

/// Rebase `branch` (or the current branch) onto `target`.
pub fn rebase(target: &str, branch: Option<&str>) -> Result<()> {
    let mut driver = utils::open_driver()?;
    let branch = match branch {
        Some(branch) => branch.to_string(),
        None => driver
            .repository()
            .current_branch()
            .context("HEAD is detached - pass --branch or checkout a branch")?,
    };

    let result = driver.rebase(target, &branch)?;
    utils::report(&driver, &result, &format!("Rebased {branch} onto {target}"))
}

pub fn squash(
    onto: &str,
    commits: &[String],
    base: Option<&str>,
    message: Option<&str>,
) -> Result<()> {
    let mut driver = utils::open_driver()?;
    let onto = utils::resolve_commit(&driver, onto)?;
    let commits = utils::resolve_commits(&driver, commits)?;

    let result = driver.squash(&commits, &onto, base, message.unwrap_or_default())?;
    utils::report(
        &driver,
        &result,
        &format!("Squashed {} commit(s) into {}", commits.len(), onto.short_sha()),
    )
}

pub fn reorder(commits: &[String], base: Option<&str>) -> Result<()> {
    let mut driver = utils::open_driver()?;
    let order: Vec<_> = utils::resolve_commits(&driver, commits)?
        .into_iter()
        .map(|c| c.sha)
        .collect();

    let result = driver.reorder(&order, base)?;
    utils::report(&driver, &result, &format!("Reordered {} commit(s)", order.len()))
}

pub fn reword(commit: &str, message: &str) -> Result<()> {
    let mut driver = utils::open_driver()?;
    let commit = utils::resolve_commit(&driver, commit)?;

    let result = driver.reword(&commit, message)?;
    utils::report(&driver, &result, &format!("Reworded {}", commit.short_sha()))
}

pub fn cherry_pick(commits: &[String], onto: &str) -> Result<()> {
    let mut driver = utils::open_driver()?;
    let commits = utils::resolve_commits(&driver, commits)?;

    let result = driver.cherry_pick(&commits, onto)?;
    utils::report(
        &driver,
        &result,
        &format!("Applied {} commit(s) to {onto}", commits.len()),
    )
}
