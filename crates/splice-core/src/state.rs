//! State persistence for the .git/splice/ directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splice_git::Oid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::plan::OperationKind;
use crate::session::SessionJournal;

/// Manages the .git/splice/ directory state.
#[derive(Debug, Clone)]
pub struct State {
    /// Path to the .git/splice/ directory.
    splice_dir: PathBuf,
}

impl State {
    /// File names within .git/splice/
    const SESSION_FILE: &'static str = "session.json";
    const UNDO_FILE: &'static str = "undo.json";
    const CONFIG_FILE: &'static str = "config.toml";

    /// Create a new State instance for the given git directory.
    ///
    /// # Errors
    /// Returns error if the git directory doesn't exist.
    pub fn new(git_dir: impl AsRef<Path>) -> Result<Self> {
        let git_dir = git_dir.as_ref();
        if !git_dir.is_dir() {
            return Err(Error::NotARepository);
        }

        Ok(Self {
            splice_dir: git_dir.join("splice"),
        })
    }

    /// Get the path to the splice directory.
    #[must_use]
    pub fn splice_dir(&self) -> &Path {
        &self.splice_dir
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.splice_dir.join(Self::CONFIG_FILE)
    }

    /// Load the repository's config, or defaults if there is none.
    ///
    /// # Errors
    /// Returns error if the config file exists but can't be parsed.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config_path())
    }

    // === Session journal ===

    fn session_path(&self) -> PathBuf {
        self.splice_dir.join(Self::SESSION_FILE)
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session_path().exists()
    }

    /// Load the session journal, if one exists.
    ///
    /// # Errors
    /// Returns error if the journal exists but can't be read or parsed.
    pub fn load_session(&self) -> Result<Option<SessionJournal>> {
        self.load_json(&self.session_path())
    }

    /// Save the session journal.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save_session(&self, journal: &SessionJournal) -> Result<()> {
        self.save_json(&self.session_path(), journal)
    }

    /// Remove the session journal (operation completed or aborted).
    ///
    /// # Errors
    /// Returns error if file removal fails.
    pub fn clear_session(&self) -> Result<()> {
        remove_if_exists(&self.session_path())
    }

    // === Undo record ===

    fn undo_path(&self) -> PathBuf {
        self.splice_dir.join(Self::UNDO_FILE)
    }

    /// Load the undo record of the last completed operation.
    ///
    /// # Errors
    /// Returns error if the record exists but can't be read or parsed.
    pub fn load_undo(&self) -> Result<Option<UndoRecord>> {
        self.load_json(&self.undo_path())
    }

    /// Save the undo record, replacing any previous one.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save_undo(&self, record: &UndoRecord) -> Result<()> {
        self.save_json(&self.undo_path(), record)
    }

    /// Remove the undo record.
    ///
    /// # Errors
    /// Returns error if file removal fails.
    pub fn clear_undo(&self) -> Result<()> {
        remove_if_exists(&self.undo_path())
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::StateParseError {
                file: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.splice_dir)?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Where a branch pointed before and after a completed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRecord {
    pub kind: OperationKind,
    pub branch: String,
    pub before_tip: String,
    pub after_tip: String,
    pub recorded_at: DateTime<Utc>,
}

impl UndoRecord {
    #[must_use]
    pub fn new(kind: OperationKind, branch: impl Into<String>, before: Oid, after: Oid) -> Self {
        Self {
            kind,
            branch: branch.into(),
            before_tip: before.to_string(),
            after_tip: after.to_string(),
            recorded_at: Utc::now(),
        }
    }

    /// Parsed `before_tip`.
    ///
    /// # Errors
    /// Returns error if the stored id is malformed.
    pub fn before(&self) -> Result<Oid> {
        parse_oid(&self.before_tip)
    }

    /// Parsed `after_tip`.
    ///
    /// # Errors
    /// Returns error if the stored id is malformed.
    pub fn after(&self) -> Result<Oid> {
        parse_oid(&self.after_tip)
    }
}

pub(crate) fn parse_oid(hex: &str) -> Result<Oid> {
    Oid::from_str(hex).map_err(|e| Error::Git(e.into()))
}
