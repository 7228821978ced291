//! Configuration management for splice.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use splice_git::GitCli;

use crate::error::Result;

/// splice configuration loaded from .git/splice/config.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// How git is invoked.
    #[serde(default)]
    pub git: GitConfig,

    /// Rewrite behavior.
    #[serde(default)]
    pub rewrite: RewriteConfig,
}

impl Config {
    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Build the git executor this configuration describes.
    #[must_use]
    pub fn executor(&self) -> GitCli {
        GitCli::with_program(&self.git.executable).with_env(self.git.env.clone())
    }
}

/// Settings for the git executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path or name of the git executable.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Extra environment passed to every git invocation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            env: BTreeMap::new(),
        }
    }
}

fn default_executable() -> PathBuf {
    PathBuf::from("git")
}

/// How rewrites treat commits and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Drop commits that become empty when rebased onto a new base.
    #[serde(default = "default_true")]
    pub drop_emptied_commits: bool,

    /// Keep cherry-picked commits whose changes are already present.
    #[serde(default = "default_true")]
    pub keep_redundant_commits: bool,

    /// Record the pre-operation tip so the last rewrite can be undone.
    #[serde(default = "default_true")]
    pub record_undo: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            drop_emptied_commits: true,
            keep_redundant_commits: true,
            record_undo: true,
        }
    }
}

const fn default_true() -> bool {
    true
}
