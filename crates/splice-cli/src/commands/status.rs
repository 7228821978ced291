//! `splice status` command - Show the operation in progress.

use anyhow::Result;
use serde::Serialize;
use splice_core::{OperationDriver, ResolutionRequest};

use crate::commands::utils;
use crate::output;

#[derive(Debug, Serialize)]
struct JsonOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    /// What git reports is in progress.
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionInfo>,
    conflicts: Vec<ConflictInfo>,
}

#[derive(Debug, Serialize)]
struct SessionInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    step: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
struct ConflictInfo {
    path: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    markers: Option<usize>,
}

impl From<&ResolutionRequest> for ConflictInfo {
    fn from(request: &ResolutionRequest) -> Self {
        Self {
            path: request.path.clone(),
            kind: request.kind.to_string(),
            markers: request.marker_count,
        }
    }
}

/// Run the status command.
pub fn run(json: bool) -> Result<()> {
    let driver = utils::open_driver()?;
    let status = collect(&driver)?;

    if json {
        output::essential(&serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn collect(driver: &OperationDriver) -> Result<JsonOutput> {
    let operation = driver.operation_state()?;
    let status = driver.status()?;

    Ok(JsonOutput {
        branch: status.current_branch,
        operation: operation.name(),
        session: driver.session().map(|s| SessionInfo {
            kind: s.kind.to_string(),
            branch: s.branch.clone(),
            step: s.current_step,
            total: s.total_steps,
        }),
        conflicts: driver.conflicts()?.iter().map(ConflictInfo::from).collect(),
    })
}

fn print_status(status: &JsonOutput) {
    match &status.branch {
        Some(branch) => output::info(&format!("On branch {branch}")),
        None => output::info("HEAD is detached"),
    }

    match &status.session {
        Some(session) => output::info(&format!(
            "{} in progress on {}: step {}/{}",
            session.kind,
            session.branch.as_deref().unwrap_or("(unknown branch)"),
            session.step,
            session.total
        )),
        None if status.operation != "none" => {
            output::warn(&format!(
                "A {} is in progress that splice did not start",
                status.operation
            ));
        }
        None => output::success("No operation in progress"),
    }

    if !status.conflicts.is_empty() {
        output::hr();
        for conflict in &status.conflicts {
            output::detail(&output::conflict_line(
                &conflict.path,
                &conflict.kind,
                conflict.markers,
            ));
        }
    }
}
