//! Shared helpers for driving real git repositories in tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;

use splice_core::OperationDriver;
use splice_git::{Commit, Oid, Repository};
use tempfile::TempDir;

/// A scratch repository on `main` with one initial commit.
pub struct TestRepo {
    temp: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = Self { temp };

        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo.git(&["config", "core.editor", "true"]);
        repo.commit_file("README.md", "# Test Repo\n", "Initial commit");

        repo
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Run git, panicking on failure, and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(self.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim_end().to_string()
    }

    pub fn write(&self, name: &str, contents: &str) {
        fs::write(self.path().join(name), contents).expect("Failed to write file");
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).expect("Failed to read file")
    }

    /// Write `name` and commit it, returning the new commit.
    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Oid {
        self.write(name, contents);
        self.git(&["add", name]);
        self.git(&["commit", "--quiet", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> Oid {
        self.rev("HEAD")
    }

    pub fn rev(&self, spec: &str) -> Oid {
        Oid::from_str(&self.git(&["rev-parse", spec])).expect("Invalid oid")
    }

    pub fn current_branch(&self) -> String {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn commit(&self, oid: Oid) -> Commit {
        Repository::open(self.path())
            .expect("Failed to open repo")
            .find_commit(oid)
            .expect("Failed to find commit")
    }

    /// Summaries of `HEAD`'s history, newest first.
    pub fn summaries(&self) -> Vec<String> {
        self.git(&["log", "--format=%s"])
            .lines()
            .map(String::from)
            .collect()
    }

    /// Full message of `spec`, without trailing newlines.
    pub fn message(&self, spec: &str) -> String {
        self.git(&["log", "-1", "--format=%B", spec])
    }

    pub fn has_journal(&self) -> bool {
        self.path().join(".git/splice/session.json").exists()
    }

    pub fn driver(&self) -> OperationDriver {
        OperationDriver::open(self.path()).expect("Failed to open driver")
    }
}
