//! Working-directory status from `git status --porcelain=2 -z`.

use std::path::Path;

use git2::Oid;
use tracing::debug;

use crate::error::{Error, Result};
use crate::exec::{ExecOptions, GitErrorKind, GitExecutor};

/// Kind of change on one side (index or worktree) of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    TypeChanged,
    Added,
    Deleted,
    Renamed,
    Copied,
}

impl ChangeKind {
    fn from_code(code: char) -> Result<Option<Self>> {
        Ok(Some(match code {
            '.' => return Ok(None),
            'M' => Self::Modified,
            'T' => Self::TypeChanged,
            'A' => Self::Added,
            'D' => Self::Deleted,
            'R' => Self::Renamed,
            'C' => Self::Copied,
            other => {
                return Err(Error::parse(
                    "status",
                    format!("unknown change code '{other}'"),
                ));
            }
        }))
    }
}

/// How both sides of a merge touched a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    BothDeleted,
    AddedByUs,
    DeletedByThem,
    AddedByThem,
    DeletedByUs,
    BothAdded,
    BothModified,
}

impl ConflictKind {
    fn from_code(code: &str) -> Result<Self> {
        Ok(match code {
            "DD" => Self::BothDeleted,
            "AU" => Self::AddedByUs,
            "UD" => Self::DeletedByThem,
            "UA" => Self::AddedByThem,
            "DU" => Self::DeletedByUs,
            "AA" => Self::BothAdded,
            "UU" => Self::BothModified,
            other => {
                return Err(Error::parse(
                    "status",
                    format!("unknown unmerged code '{other}'"),
                ));
            }
        })
    }

    /// Whether our side of the merge still has the file.
    #[must_use]
    pub const fn ours_present(self) -> bool {
        !matches!(self, Self::BothDeleted | Self::DeletedByUs | Self::AddedByThem)
    }

    /// Whether their side of the merge still has the file.
    #[must_use]
    pub const fn theirs_present(self) -> bool {
        !matches!(self, Self::BothDeleted | Self::DeletedByThem | Self::AddedByUs)
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::BothDeleted => "both deleted",
            Self::AddedByUs => "added by us",
            Self::DeletedByThem => "deleted by them",
            Self::AddedByThem => "added by them",
            Self::DeletedByUs => "deleted by us",
            Self::BothAdded => "both added",
            Self::BothModified => "both modified",
        };
        f.write_str(text)
    }
}

/// Overall status of one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed { old_path: String },
    Copied { old_path: String },
    TypeChanged,
    Conflicted(ConflictKind),
    Untracked,
}

/// Submodule sub-status from the `S<c><m><u>` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmoduleStatus {
    pub commit_changed: bool,
    pub modified_changes: bool,
    pub untracked_changes: bool,
}

impl SubmoduleStatus {
    fn parse(field: &str) -> Result<Option<Self>> {
        let mut chars = field.chars();
        match chars.next() {
            Some('N') => Ok(None),
            Some('S') => {
                let flags: Vec<char> = chars.collect();
                if flags.len() != 3 {
                    return Err(Error::parse(
                        "status",
                        format!("malformed submodule field '{field}'"),
                    ));
                }
                Ok(Some(Self {
                    commit_changed: flags[0] == 'C',
                    modified_changes: flags[1] == 'M',
                    untracked_changes: flags[2] == 'U',
                }))
            }
            _ => Err(Error::parse(
                "status",
                format!("malformed submodule field '{field}'"),
            )),
        }
    }
}

/// Blob ids of the three index stages of a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictStages {
    pub base: Option<Oid>,
    pub ours: Option<Oid>,
    pub theirs: Option<Oid>,
}

/// One path reported by status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub status: FileStatus,
    /// Change recorded in the index relative to HEAD.
    pub staged: Option<ChangeKind>,
    /// Change in the worktree relative to the index.
    pub unstaged: Option<ChangeKind>,
    pub submodule: Option<SubmoduleStatus>,
    /// Present only for conflicted entries.
    pub stages: Option<ConflictStages>,
}

impl StatusEntry {
    #[must_use]
    pub const fn is_conflicted(&self) -> bool {
        matches!(self.status, FileStatus::Conflicted(_))
    }

    #[must_use]
    pub const fn is_untracked(&self) -> bool {
        matches!(self.status, FileStatus::Untracked)
    }

    /// Conflict kind, if the entry is conflicted.
    #[must_use]
    pub const fn conflict(&self) -> Option<ConflictKind> {
        match self.status {
            FileStatus::Conflicted(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Parsed working-directory status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusResult {
    /// `None` when HEAD is detached or outside a repository.
    pub current_branch: Option<String>,
    /// `None` for an unborn branch.
    pub current_tip: Option<Oid>,
    pub files: Vec<StatusEntry>,
}

impl StatusResult {
    pub fn conflicted(&self) -> impl Iterator<Item = &StatusEntry> {
        self.files.iter().filter(|f| f.is_conflicted())
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        self.conflicted().next().is_some()
    }

    /// Whether any tracked file differs from HEAD in the index or worktree.
    #[must_use]
    pub fn has_tracked_changes(&self) -> bool {
        self.files.iter().any(|f| !f.is_untracked())
    }

    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&StatusEntry> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Read the status of the repository at `repo_path`.
///
/// A path that does not exist or is not inside a repository yields an empty
/// result.
///
/// # Errors
/// Returns error if git fails for any other reason or its output cannot be
/// parsed.
pub fn get_status<E: GitExecutor + ?Sized>(git: &E, repo_path: &Path) -> Result<StatusResult> {
    if !repo_path.is_dir() {
        return Ok(StatusResult::default());
    }

    let options = ExecOptions::new().expect(GitErrorKind::NotAGitRepository);
    let output = git.run(
        &[
            "--no-optional-locks",
            "status",
            "--untracked-files=all",
            "--branch",
            "--porcelain=2",
            "-z",
        ],
        repo_path,
        &options,
    )?;

    if output.classified_error.is_some() {
        debug!(path = %repo_path.display(), "status requested outside a repository");
        return Ok(StatusResult::default());
    }

    parse_porcelain_v2(&output.stdout)
}

/// Conflicted entries of the repository at `repo_path`.
///
/// # Errors
/// Returns error if status cannot be read.
pub fn get_conflicted_files<E: GitExecutor + ?Sized>(
    git: &E,
    repo_path: &Path,
) -> Result<Vec<StatusEntry>> {
    let status = get_status(git, repo_path)?;
    Ok(status.files.into_iter().filter(StatusEntry::is_conflicted).collect())
}

/// Parse NUL-delimited `--porcelain=2 --branch` output.
///
/// # Errors
/// Returns error on malformed records.
pub fn parse_porcelain_v2(output: &str) -> Result<StatusResult> {
    let mut result = StatusResult::default();
    let mut tokens = output.split('\0');

    while let Some(token) = tokens.next() {
        if token.is_empty() {
            continue;
        }

        let Some((tag, rest)) = token.split_once(' ') else {
            return Err(Error::parse("status", format!("malformed record '{token}'")));
        };

        match tag {
            "#" => parse_header(rest, &mut result)?,
            "1" => result.files.push(parse_ordinary(rest)?),
            "2" => {
                let old_path = tokens.next().ok_or_else(|| {
                    Error::parse("status", "rename record without original path")
                })?;
                result.files.push(parse_renamed(rest, old_path)?);
            }
            "u" => result.files.push(parse_unmerged(rest)?),
            "?" => result.files.push(StatusEntry {
                path: rest.to_string(),
                status: FileStatus::Untracked,
                staged: None,
                unstaged: None,
                submodule: None,
                stages: None,
            }),
            "!" => {}
            other => {
                return Err(Error::parse("status", format!("unknown record type '{other}'")));
            }
        }
    }

    Ok(result)
}

fn parse_header(header: &str, result: &mut StatusResult) -> Result<()> {
    let (key, value) = header.split_once(' ').unwrap_or((header, ""));
    match key {
        "branch.oid" if value != "(initial)" => {
            let oid = Oid::from_str(value)
                .map_err(|e| Error::parse("status", format!("bad branch.oid '{value}': {e}")))?;
            result.current_tip = Some(oid);
        }
        "branch.head" if value != "(detached)" => {
            result.current_branch = Some(value.to_string());
        }
        _ => {}
    }
    Ok(())
}

/// Split `count` space-separated fields; the remainder is the path, which may
/// itself contain spaces or newlines.
fn fields(record: &str, count: usize) -> Result<(Vec<&str>, &str)> {
    let mut parts = record.splitn(count + 1, ' ');
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(parts.next().ok_or_else(|| {
            Error::parse("status", format!("truncated record '{record}'"))
        })?);
    }
    let path = parts
        .next()
        .ok_or_else(|| Error::parse("status", format!("record without path '{record}'")))?;
    Ok((out, path))
}

fn sides(xy: &str) -> Result<(Option<ChangeKind>, Option<ChangeKind>)> {
    let mut chars = xy.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(x), Some(y), None) => Ok((ChangeKind::from_code(x)?, ChangeKind::from_code(y)?)),
        _ => Err(Error::parse("status", format!("malformed XY field '{xy}'"))),
    }
}

fn overall(staged: Option<ChangeKind>, unstaged: Option<ChangeKind>) -> FileStatus {
    let either = |kind| staged == Some(kind) || unstaged == Some(kind);
    if either(ChangeKind::Added) {
        FileStatus::Added
    } else if either(ChangeKind::Deleted) {
        FileStatus::Deleted
    } else if either(ChangeKind::TypeChanged) {
        FileStatus::TypeChanged
    } else {
        FileStatus::Modified
    }
}

// 1 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>
fn parse_ordinary(record: &str) -> Result<StatusEntry> {
    let (f, path) = fields(record, 7)?;
    let (staged, unstaged) = sides(f[0])?;
    Ok(StatusEntry {
        path: path.to_string(),
        status: overall(staged, unstaged),
        staged,
        unstaged,
        submodule: SubmoduleStatus::parse(f[1])?,
        stages: None,
    })
}

// 2 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>\0<origPath>
fn parse_renamed(record: &str, old_path: &str) -> Result<StatusEntry> {
    let (f, path) = fields(record, 8)?;
    let (staged, unstaged) = sides(f[0])?;
    let old_path = old_path.to_string();
    let status = if f[7].starts_with('C') {
        FileStatus::Copied { old_path }
    } else {
        FileStatus::Renamed { old_path }
    };
    Ok(StatusEntry {
        path: path.to_string(),
        status,
        staged,
        unstaged,
        submodule: SubmoduleStatus::parse(f[1])?,
        stages: None,
    })
}

// u <XY> <sub> <m1> <m2> <m3> <mW> <h1> <h2> <h3> <path>
fn parse_unmerged(record: &str) -> Result<StatusEntry> {
    let (f, path) = fields(record, 9)?;
    let kind = ConflictKind::from_code(f[0])?;
    Ok(StatusEntry {
        path: path.to_string(),
        status: FileStatus::Conflicted(kind),
        staged: None,
        unstaged: None,
        submodule: SubmoduleStatus::parse(f[1])?,
        stages: Some(ConflictStages {
            base: stage_oid(f[6])?,
            ours: stage_oid(f[7])?,
            theirs: stage_oid(f[8])?,
        }),
    })
}

fn stage_oid(hex: &str) -> Result<Option<Oid>> {
    let oid = Oid::from_str(hex)
        .map_err(|e| Error::parse("status", format!("bad object id '{hex}': {e}")))?;
    Ok((!oid.is_zero()).then_some(oid))
}
