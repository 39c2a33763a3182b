//! Transient session data: what the repository looks like, which method the
//! user picked, what conflicted and whether we stashed anything.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::error::VcsError;
use crate::vcs::VersionControl;

/// Prefix of every stash label created by syncup
pub const STASH_LABEL_PREFIX: &str = "syncup-autostash";

/// How upstream changes are brought into the branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    Rebase,
    Merge,
}

impl ResolutionMethod {
    /// Parse a numeric menu answer ("1" or "2")
    pub fn from_menu(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(ResolutionMethod::Rebase),
            "2" => Some(ResolutionMethod::Merge),
            _ => None,
        }
    }

    /// Command that finishes the integration once conflicts are staged
    pub fn continue_command(self) -> &'static str {
        match self {
            ResolutionMethod::Rebase => "git rebase --continue",
            ResolutionMethod::Merge => "git commit",
        }
    }

    pub fn abort_command(self) -> &'static str {
        match self {
            ResolutionMethod::Rebase => "git rebase --abort",
            ResolutionMethod::Merge => "git merge --abort",
        }
    }

    /// Push command to publish the integrated branch
    ///
    /// A rebase rewrites history, so it needs a force push guarded by
    /// `--force-with-lease`.
    pub fn push_command(self, branch: &str) -> String {
        match self {
            ResolutionMethod::Rebase => format!("git push --force-with-lease origin {}", branch),
            ResolutionMethod::Merge => format!("git push origin {}", branch),
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMethod::Rebase => write!(f, "rebase"),
            ResolutionMethod::Merge => write!(f, "merge"),
        }
    }
}

/// Snapshot of the repository as reported by git
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryContext {
    pub branch: String,
    pub remotes: BTreeMap<String, String>,
    pub dirty: bool,
}

impl RepositoryContext {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..Default::default()
        }
    }

    pub fn refresh_remotes(&mut self, vcs: &dyn VersionControl) -> Result<(), VcsError> {
        self.remotes = vcs.remotes()?;
        Ok(())
    }

    pub fn refresh_dirty(&mut self, vcs: &dyn VersionControl) -> Result<(), VcsError> {
        self.dirty = vcs.has_uncommitted_changes()?;
        Ok(())
    }

    pub fn has_remote(&self, name: &str) -> bool {
        self.remotes.contains_key(name)
    }
}

/// Unmerged paths left by a rebase or merge, in report order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet {
    paths: Vec<String>,
}

impl ConflictSet {
    /// Build from git's report, dropping blanks and repeats
    ///
    /// Names are kept exactly as given; a file may legitimately start or end
    /// with whitespace.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for path in paths {
            let path: String = path.into();
            if path.trim().is_empty() || unique.contains(&path) {
                continue;
            }
            unique.push(path);
        }
        Self { paths: unique }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.paths.iter()
    }
}

/// What happened to the autostash by the end of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StashStatus {
    NotCreated,
    Restored { label: String },
    /// Pop hit conflicts; the entry is still in the stash list
    Conflicted { label: String },
    /// Integration stopped on conflicts; the user pops it later
    LeftForUser { label: String },
}

/// Bookkeeping for the autostash
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub stash_label: Option<String>,
    pub stashed: bool,
    pub restored: bool,
}

impl SessionState {
    pub fn record_stash(&mut self, label: String) {
        self.stash_label = Some(label);
        self.stashed = true;
        self.restored = false;
    }

    /// Label of a stash that still needs restoring, if any
    pub fn pending_stash(&self) -> Option<&str> {
        if self.stashed && !self.restored {
            self.stash_label.as_deref()
        } else {
            None
        }
    }

    /// Hand the stash over to the user without restoring it
    pub fn leave_for_user(&self) -> StashStatus {
        match self.pending_stash() {
            Some(label) => StashStatus::LeftForUser {
                label: label.to_string(),
            },
            None => StashStatus::NotCreated,
        }
    }
}

/// Unique stash label for this invocation
pub fn stash_label(now: DateTime<Local>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        STASH_LABEL_PREFIX,
        now.format("%Y%m%d-%H%M%S"),
        &suffix[..8]
    )
}
