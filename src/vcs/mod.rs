//! Version-control collaborator
//!
//! The orchestrator talks to git only through [`VersionControl`]. The
//! production implementation, [`GitCli`], runs the `git` executable as a child
//! process; tests substitute an in-memory double.

mod git;

use std::collections::BTreeMap;

pub use git::GitCli;

use crate::core::session::ResolutionMethod;
use crate::error::VcsError;

/// Result of an operation that may stop part-way (rebase, merge, continue)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationStatus {
    Clean,
    /// Non-zero exit; `detail` is git's own explanation
    Stopped { detail: String },
}

/// Result of restoring a stash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashRestore {
    Restored,
    /// Applied with conflicts; git keeps the entry in the stash list
    Conflicted,
}

pub trait VersionControl {
    fn is_work_tree(&self) -> Result<bool, VcsError>;

    /// Short name of the checked-out branch, `None` on a detached HEAD
    fn current_branch(&self) -> Result<Option<String>, VcsError>;

    /// Configured remotes and their fetch URLs
    fn remotes(&self) -> Result<BTreeMap<String, String>, VcsError>;

    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), VcsError>;

    fn fetch(&mut self, remote: &str) -> Result<(), VcsError>;

    /// Whether tracked files differ from HEAD
    fn has_uncommitted_changes(&self) -> Result<bool, VcsError>;

    /// Stash tracked changes under `label`; false if nothing was stashed
    fn stash_push(&mut self, label: &str) -> Result<bool, VcsError>;

    /// Pop the stash entry created with `label`
    fn stash_pop(&mut self, label: &str) -> Result<StashRestore, VcsError>;

    /// Rebase onto or merge `target` (e.g. `upstream/main`)
    fn integrate(
        &mut self,
        method: ResolutionMethod,
        target: &str,
    ) -> Result<IntegrationStatus, VcsError>;

    fn unmerged_paths(&self) -> Result<Vec<String>, VcsError>;

    /// Rebase or merge currently stopped in the working tree, if any
    fn integration_in_progress(&self) -> Result<Option<ResolutionMethod>, VcsError>;

    fn continue_rebase(&mut self) -> Result<IntegrationStatus, VcsError>;

    fn commit_merge(&mut self) -> Result<IntegrationStatus, VcsError>;

    fn abort(&mut self, method: ResolutionMethod) -> Result<(), VcsError>;
}
