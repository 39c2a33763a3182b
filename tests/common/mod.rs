//! Test doubles for driving the orchestrator without a real repository

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::io;

use syncup::core::{Orchestrator, Outcome, ResolutionMethod, Settings};
use syncup::editor::{EditorCommand, Launcher};
use syncup::error::{SyncResult, VcsError};
use syncup::prompt::ScriptedPrompter;
use syncup::vcs::{IntegrationStatus, StashRestore, VersionControl};

/// In-memory repository that records every call it receives
#[derive(Debug, Default)]
pub struct FakeVcs {
    pub work_tree: bool,
    pub branch: Option<String>,
    pub remotes: BTreeMap<String, String>,
    pub dirty: bool,
    pub fetch_fails: bool,
    /// Paths left unmerged by the next `integrate`
    pub integration_conflicts: Vec<String>,
    pub integration_fails_cleanly: bool,
    pub stash_pop_conflicts: bool,
    /// `stash_pop` errors out and leaves the entry alone
    pub stash_pop_fails: bool,
    /// Paths left unmerged by the next `continue_rebase`
    pub continue_conflicts: Vec<String>,
    pub in_progress: Option<ResolutionMethod>,
    pub unmerged: Vec<String>,
    pub stashes: Vec<String>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeVcs {
    /// Repository on `branch` with an `origin` and an `upstream` remote
    pub fn on_branch(branch: &str) -> Self {
        let mut remotes = BTreeMap::new();
        remotes.insert(
            "origin".to_string(),
            "git@example.com:me/project.git".to_string(),
        );
        remotes.insert(
            "upstream".to_string(),
            "https://example.com/org/project.git".to_string(),
        );
        Self {
            work_tree: true,
            branch: Some(branch.to_string()),
            remotes,
            ..Default::default()
        }
    }

    pub fn without_upstream(mut self) -> Self {
        self.remotes.remove("upstream");
        self
    }

    pub fn with_conflicts(mut self, paths: &[&str]) -> Self {
        self.integration_conflicts = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| c.starts_with(prefix))
    }
}

impl VersionControl for FakeVcs {
    fn is_work_tree(&self) -> Result<bool, VcsError> {
        self.record("is_work_tree");
        Ok(self.work_tree)
    }

    fn current_branch(&self) -> Result<Option<String>, VcsError> {
        self.record("current_branch");
        Ok(self.branch.clone())
    }

    fn remotes(&self) -> Result<BTreeMap<String, String>, VcsError> {
        self.record("remotes");
        Ok(self.remotes.clone())
    }

    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), VcsError> {
        self.record(format!("add_remote {} {}", name, url));
        self.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn fetch(&mut self, remote: &str) -> Result<(), VcsError> {
        self.record(format!("fetch {}", remote));
        if self.fetch_fails {
            return Err(VcsError::Spawn {
                command: format!("git fetch {}", remote),
                source: io::Error::new(io::ErrorKind::Other, "could not resolve host"),
            });
        }
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool, VcsError> {
        self.record("has_uncommitted_changes");
        Ok(self.dirty)
    }

    fn stash_push(&mut self, label: &str) -> Result<bool, VcsError> {
        self.record(format!("stash_push {}", label));
        if !self.dirty {
            return Ok(false);
        }
        self.stashes.push(label.to_string());
        self.dirty = false;
        Ok(true)
    }

    fn stash_pop(&mut self, label: &str) -> Result<StashRestore, VcsError> {
        self.record(format!("stash_pop {}", label));
        if !self.stashes.iter().any(|s| s == label) {
            return Err(VcsError::StashNotFound {
                label: label.to_string(),
            });
        }
        if self.stash_pop_fails {
            return Err(VcsError::Spawn {
                command: format!("git stash pop {}", label),
                source: io::Error::new(io::ErrorKind::Other, "index.lock exists"),
            });
        }
        if self.stash_pop_conflicts {
            return Ok(StashRestore::Conflicted);
        }
        self.stashes.retain(|s| s != label);
        self.dirty = true;
        Ok(StashRestore::Restored)
    }

    fn integrate(
        &mut self,
        method: ResolutionMethod,
        target: &str,
    ) -> Result<IntegrationStatus, VcsError> {
        self.record(format!("integrate {} {}", method, target));
        if !self.integration_conflicts.is_empty() {
            self.unmerged = self.integration_conflicts.clone();
            self.in_progress = Some(method);
            return Ok(IntegrationStatus::Stopped {
                detail: "CONFLICT (content)".to_string(),
            });
        }
        if self.integration_fails_cleanly {
            return Ok(IntegrationStatus::Stopped {
                detail: "fatal: invalid upstream 'upstream/main'".to_string(),
            });
        }
        Ok(IntegrationStatus::Clean)
    }

    fn unmerged_paths(&self) -> Result<Vec<String>, VcsError> {
        self.record("unmerged_paths");
        Ok(self.unmerged.clone())
    }

    fn integration_in_progress(&self) -> Result<Option<ResolutionMethod>, VcsError> {
        self.record("integration_in_progress");
        Ok(self.in_progress)
    }

    fn continue_rebase(&mut self) -> Result<IntegrationStatus, VcsError> {
        self.record("continue_rebase");
        if !self.continue_conflicts.is_empty() {
            self.unmerged = std::mem::take(&mut self.continue_conflicts);
            return Ok(IntegrationStatus::Stopped {
                detail: "CONFLICT (content)".to_string(),
            });
        }
        self.in_progress = None;
        Ok(IntegrationStatus::Clean)
    }

    fn commit_merge(&mut self) -> Result<IntegrationStatus, VcsError> {
        self.record("commit_merge");
        self.in_progress = None;
        Ok(IntegrationStatus::Clean)
    }

    fn abort(&mut self, method: ResolutionMethod) -> Result<(), VcsError> {
        self.record(format!("abort {}", method));
        self.in_progress = None;
        self.unmerged.clear();
        Ok(())
    }
}

/// Launcher with a fixed set of programs "on PATH"
#[derive(Debug, Default)]
pub struct FakeLauncher {
    pub available: HashSet<String>,
    pub launched: Vec<(String, Vec<String>)>,
    pub fail: bool,
}

impl FakeLauncher {
    pub fn with(programs: &[&str]) -> Self {
        Self {
            available: programs.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl Launcher for FakeLauncher {
    fn is_available(&self, program: &str) -> bool {
        self.available.contains(program)
    }

    fn launch(&mut self, editor: &EditorCommand, paths: &[String]) -> io::Result<()> {
        self.launched.push((editor.program.clone(), paths.to_vec()));
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not found"));
        }
        Ok(())
    }
}

/// Everything a finished session leaves behind
pub struct Session {
    pub result: SyncResult<Outcome>,
    pub output: String,
    pub prompter: ScriptedPrompter,
    pub launcher: FakeLauncher,
}

pub enum Mode {
    Run,
    Resume,
}

pub fn drive(
    vcs: &mut FakeVcs,
    answers: &[&str],
    settings: Settings,
    launcher: FakeLauncher,
    mode: Mode,
) -> Session {
    colored::control::set_override(false);

    let mut prompter = ScriptedPrompter::new(answers.iter().copied());
    let mut launcher = launcher;
    let mut buffer: Vec<u8> = Vec::new();

    let result = {
        let mut orchestrator =
            Orchestrator::new(vcs, &mut prompter, &mut launcher, &mut buffer, settings);
        match mode {
            Mode::Run => orchestrator.run(),
            Mode::Resume => orchestrator.resume(),
        }
    };

    Session {
        result,
        output: String::from_utf8(buffer).unwrap(),
        prompter,
        launcher,
    }
}

/// Run the guided workflow with default settings and no editors on PATH
pub fn run(vcs: &mut FakeVcs, answers: &[&str]) -> Session {
    drive(
        vcs,
        answers,
        Settings::default(),
        FakeLauncher::default(),
        Mode::Run,
    )
}
