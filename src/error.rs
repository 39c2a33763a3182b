//! Error taxonomy for the guided workflow
//!
//! Every terminal failure maps to an [`ErrorCategory`], which in turn picks
//! the process exit code. Conflicts are not errors: they are reported through
//! [`crate::core::Outcome`].

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::core::session::ResolutionMethod;

/// Failure of a single `git` invocation
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("no stash entry labelled '{label}'")]
    StashNotFound { label: String },
}

/// Broad class of a failure, used to pick the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The user must fix something and re-run
    Precondition,
    /// Network or transport failure talking to the remote
    Transport,
    /// Unexpected failure of git or the terminal
    Internal,
}

impl ErrorCategory {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCategory::Precondition => 1,
            ErrorCategory::Transport => 2,
            ErrorCategory::Internal => 3,
        }
    }
}

/// Terminal failure of a session
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not inside a git working tree")]
    NotARepository,

    #[error("HEAD is detached; no branch is checked out")]
    DetachedHead,

    #[error("refusing to integrate upstream changes directly into protected branch '{branch}'")]
    ProtectedBranch { branch: String },

    #[error("remote '{remote}' is not configured")]
    MissingRemote { remote: String },

    #[error("working tree has uncommitted changes")]
    UncommittedChanges,

    #[error("invalid choice '{input}'; expected 1 or 2")]
    InvalidChoice { input: String },

    #[error("a {method} is already in progress")]
    IntegrationInProgress { method: ResolutionMethod },

    #[error("no rebase or merge is in progress")]
    NoIntegrationInProgress,

    #[error("failed to fetch from '{remote}': {source}")]
    Fetch {
        remote: String,
        #[source]
        source: VcsError,
    },

    #[error("{method} stopped without reporting conflicts: {detail}")]
    IntegrationFailed {
        method: ResolutionMethod,
        detail: String,
    },

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::NotARepository
            | SyncError::DetachedHead
            | SyncError::ProtectedBranch { .. }
            | SyncError::MissingRemote { .. }
            | SyncError::UncommittedChanges
            | SyncError::InvalidChoice { .. }
            | SyncError::IntegrationInProgress { .. }
            | SyncError::NoIntegrationInProgress => ErrorCategory::Precondition,
            SyncError::Fetch { .. } => ErrorCategory::Transport,
            SyncError::IntegrationFailed { .. } | SyncError::Vcs(_) | SyncError::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.category().exit_code()
    }

    /// One-line remediation shown under the diagnostic
    pub fn hint(&self) -> String {
        match self {
            SyncError::NotARepository => {
                "Run syncup from inside a clone of the project.".to_string()
            }
            SyncError::DetachedHead => {
                "Check out your feature branch first: git switch <branch>".to_string()
            }
            SyncError::ProtectedBranch { .. } => {
                "Create a feature branch and run syncup there: git switch -c <branch>".to_string()
            }
            SyncError::MissingRemote { remote } => {
                format!("Add it with: git remote add {} <url>", remote)
            }
            SyncError::UncommittedChanges => {
                "Commit or stash your changes, then re-run syncup.".to_string()
            }
            SyncError::InvalidChoice { .. } => {
                "Re-run syncup and enter 1 (rebase) or 2 (merge).".to_string()
            }
            SyncError::IntegrationInProgress { .. } => {
                "Finish it with 'syncup continue' or undo it with 'syncup abort'.".to_string()
            }
            SyncError::NoIntegrationInProgress => {
                "Run syncup without a subcommand to start a new session.".to_string()
            }
            SyncError::Fetch { .. } => {
                "Check your network connection and remote URL, then re-run syncup.".to_string()
            }
            SyncError::IntegrationFailed { method, .. } => {
                format!("Inspect 'git status'; to undo, run: {}", method.abort_command())
            }
            SyncError::Vcs(_) => "Inspect 'git status' and re-run syncup.".to_string(),
            SyncError::Io(_) => "Re-run syncup from an interactive terminal.".to_string(),
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
