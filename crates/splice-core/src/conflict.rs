//! Conflict resolution bridge.
//!
//! Turns the conflicted entries of a status read into requests a caller can
//! act on, and applies the caller's per-file choices. Merging file contents is
//! left to the caller or their tools.

use std::fs;
use std::path::Path;

use splice_git::{ConflictKind, ExecOptions, GitExecutor, Oid, StatusResult};
use tracing::debug;

use crate::error::Result;

/// A conflicted path awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub path: String,
    pub kind: ConflictKind,
    pub base: Option<Oid>,
    pub ours: Option<Oid>,
    pub theirs: Option<Oid>,
    /// Conflict regions still marked in the working copy; `None` when the
    /// file is missing or unreadable.
    pub marker_count: Option<usize>,
}

/// How a caller settled a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The caller already edited the file into its final form.
    MarkResolved,
    /// Take our side: the branch being built.
    Ours,
    /// Take their side: the commit being applied.
    Theirs,
}

/// Build requests for every conflicted entry of `status`.
#[must_use]
pub fn resolution_requests(workdir: &Path, status: &StatusResult) -> Vec<ResolutionRequest> {
    status
        .conflicted()
        .filter_map(|entry| {
            let kind = entry.conflict()?;
            let stages = entry.stages.unwrap_or_default();
            Some(ResolutionRequest {
                path: entry.path.clone(),
                kind,
                base: stages.base,
                ours: stages.ours,
                theirs: stages.theirs,
                marker_count: fs::read(workdir.join(&entry.path))
                    .ok()
                    .map(|bytes| count_conflict_markers(&String::from_utf8_lossy(&bytes))),
            })
        })
        .collect()
}

/// Count `<<<<<<<` conflict regions.
#[must_use]
pub fn count_conflict_markers(contents: &str) -> usize {
    contents
        .lines()
        .filter(|line| line.starts_with("<<<<<<<"))
        .count()
}

/// Apply resolutions to the working copy.
///
/// `Ours`/`Theirs` check out that stage, or delete the file when that side
/// removed it. Nothing is staged here; the returned paths are what to pass to
/// `continue_operation`, in the order given.
///
/// # Errors
/// Returns error if a checkout or removal fails.
pub fn apply_resolutions<E: GitExecutor + ?Sized>(
    git: &E,
    workdir: &Path,
    requests: &[ResolutionRequest],
    resolutions: &[(String, Resolution)],
) -> Result<Vec<String>> {
    let mut resolved = Vec::with_capacity(resolutions.len());

    for (path, resolution) in resolutions {
        let kind = requests.iter().find(|r| &r.path == path).map(|r| r.kind);
        match (resolution, kind) {
            (Resolution::MarkResolved, _) | (_, None) => {}
            (Resolution::Ours, Some(kind)) => {
                take_side(git, workdir, path, "--ours", kind.ours_present())?;
            }
            (Resolution::Theirs, Some(kind)) => {
                take_side(git, workdir, path, "--theirs", kind.theirs_present())?;
            }
        }
        resolved.push(path.clone());
    }

    Ok(resolved)
}

fn take_side<E: GitExecutor + ?Sized>(
    git: &E,
    workdir: &Path,
    path: &str,
    side: &str,
    present: bool,
) -> Result<()> {
    debug!(path, side, present, "resolving conflict");
    if present {
        git.run(&["checkout", side, "--", path], workdir, &ExecOptions::new())?;
    } else {
        match fs::remove_file(workdir.join(path)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
    }
    Ok(())
}
