//! Immutable commit metadata.

use git2::Oid;

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub when: i64,
    /// Offset from UTC in minutes.
    pub offset_minutes: i32,
}

impl Identity {
    fn from_signature(sig: &git2::Signature<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
            when: sig.when().seconds(),
            offset_minutes: sig.when().offset_minutes(),
        }
    }
}

/// A `Key: value` trailer at the end of a commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub token: String,
    pub value: String,
}

/// Snapshot of a commit. Never mutated once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: Oid,
    pub parents: Vec<Oid>,
    pub author: Identity,
    pub committer: Identity,
    pub summary: String,
    pub body: String,
    pub trailers: Vec<Trailer>,
}

impl Commit {
    /// Snapshot a git2 commit.
    #[must_use]
    pub fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
        let trailers = git2::message_trailers_strs(&message)
            .map(|trailers| {
                trailers
                    .iter()
                    .map(|(token, value)| Trailer {
                        token: token.to_string(),
                        value: value.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            sha: commit.id(),
            parents: commit.parent_ids().collect(),
            author: Identity::from_signature(&commit.author()),
            committer: Identity::from_signature(&commit.committer()),
            summary: commit.summary().unwrap_or_default().to_string(),
            body: commit.body().unwrap_or_default().to_string(),
            trailers,
        }
    }

    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    #[must_use]
    pub fn short_sha(&self) -> String {
        self.sha.to_string()[..7].to_string()
    }
}
