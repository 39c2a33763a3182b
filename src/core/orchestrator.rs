//! The guided rebase/merge session
//!
//! [`Orchestrator::run`] walks the fixed sequence of checks, integrates the
//! upstream branch, and either cleans up after a conflict-free integration or
//! stops and hands the conflicted files to the user. It never waits for the
//! user to resolve anything: a conflict report ends the session.

use std::io::Write;

use chrono::Local;
use colored::Colorize;
use log::{debug, warn};

use super::session::{
    stash_label, ConflictSet, RepositoryContext, ResolutionMethod, SessionState, StashStatus,
};
use crate::config::{BranchConfig, SyncConfig, UpstreamConfig};
use crate::editor::{select_editor, Launcher};
use crate::error::{SyncError, SyncResult};
use crate::prompt::Prompter;
use crate::vcs::{IntegrationStatus, StashRestore, VersionControl};

/// Everything the session needs from configuration and the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub upstream: UpstreamConfig,
    pub branches: BranchConfig,
    /// Configured editors, highest priority first
    pub editors: Vec<String>,
    /// Value of `$EDITOR`, the last-resort editor
    pub env_editor: Option<String>,
    pub open_editor: bool,
}

impl Settings {
    pub fn from_config(config: &SyncConfig, env_editor: Option<String>) -> Self {
        Self {
            upstream: config.upstream.clone(),
            branches: config.branches.clone(),
            editors: config.editor.candidates(),
            env_editor,
            open_editor: config.editor.enabled,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default(), None)
    }
}

/// How a session ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Integrated {
        method: ResolutionMethod,
        stash: StashStatus,
    },
    /// Stopped on conflicts and handed over to the user
    ConflictsReported {
        method: ResolutionMethod,
        conflicts: ConflictSet,
        stash: StashStatus,
    },
}

pub struct Orchestrator<'a, W: Write> {
    vcs: &'a mut dyn VersionControl,
    prompter: &'a mut dyn Prompter,
    launcher: &'a mut dyn Launcher,
    out: W,
    settings: Settings,
    state: SessionState,
}

impl<'a, W: Write> Orchestrator<'a, W> {
    pub fn new(
        vcs: &'a mut dyn VersionControl,
        prompter: &'a mut dyn Prompter,
        launcher: &'a mut dyn Launcher,
        out: W,
        settings: Settings,
    ) -> Self {
        Self {
            vcs,
            prompter,
            launcher,
            out,
            settings,
            state: SessionState::default(),
        }
    }

    /// Run the full guided workflow
    pub fn run(&mut self) -> SyncResult<Outcome> {
        self.check_repository()?;
        if let Some(method) = self.vcs.integration_in_progress()? {
            writeln!(
                self.out,
                "A {} is already in progress. Resolve it with 'syncup continue' or 'syncup abort'.",
                method
            )?;
            return Err(SyncError::IntegrationInProgress { method });
        }

        let mut context = self.check_branch()?;
        self.ensure_remote(&mut context)?;
        self.fetch()?;

        // from here on an autostash may exist and every exit must account for it
        let method = match self
            .ensure_clean(&mut context)
            .and_then(|()| self.choose_method())
        {
            Ok(method) => method,
            Err(err) => {
                self.release_stash();
                return Err(err);
            }
        };

        match self.integrate_upstream(method, &context.branch) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.keep_stash_for_user();
                Err(err)
            }
        }
    }

    /// Finish a rebase or merge the user has resolved by hand
    pub fn resume(&mut self) -> SyncResult<Outcome> {
        self.check_repository()?;
        let method = self
            .vcs
            .integration_in_progress()?
            .ok_or(SyncError::NoIntegrationInProgress)?;
        debug!("resuming {}", method);

        let conflicts = ConflictSet::from_paths(self.vcs.unmerged_paths()?);
        if !conflicts.is_empty() {
            writeln!(self.out, "{}", "Some files still have conflicts.".yellow())?;
            let branch = self.branch_or_placeholder()?;
            return self.report_conflicts(method, conflicts, &branch);
        }

        let status = match method {
            ResolutionMethod::Rebase => self.vcs.continue_rebase()?,
            ResolutionMethod::Merge => self.vcs.commit_merge()?,
        };

        let branch = self.branch_or_placeholder()?;
        match status {
            IntegrationStatus::Clean => {
                writeln!(self.out, "{}", format!("The {} is complete.", method).green())?;
                self.print_push_guidance(method, &branch)?;
                Ok(Outcome::Integrated {
                    method,
                    stash: StashStatus::NotCreated,
                })
            }
            IntegrationStatus::Stopped { detail } => self.stopped(method, detail, &branch),
        }
    }

    /// Abort the rebase or merge in progress
    pub fn abort(&mut self) -> SyncResult<ResolutionMethod> {
        self.check_repository()?;
        let method = self
            .vcs
            .integration_in_progress()?
            .ok_or(SyncError::NoIntegrationInProgress)?;

        self.vcs.abort(method)?;
        writeln!(
            self.out,
            "Aborted the {}. Your branch is back where it started.",
            method
        )?;
        writeln!(
            self.out,
            "Changes stashed by syncup, if any, are still listed in 'git stash list'; restore them with 'git stash pop'."
        )?;
        Ok(method)
    }

    /// Branch name for guidance; HEAD is detached while a rebase is stopped
    fn branch_or_placeholder(&self) -> SyncResult<String> {
        Ok(self
            .vcs
            .current_branch()?
            .unwrap_or_else(|| "<branch>".to_string()))
    }

    fn check_repository(&mut self) -> SyncResult<()> {
        debug!("state: Init");
        if !self.vcs.is_work_tree()? {
            return Err(SyncError::NotARepository);
        }
        Ok(())
    }

    fn check_branch(&mut self) -> SyncResult<RepositoryContext> {
        debug!("state: BranchCheck");
        let branch = self.vcs.current_branch()?.ok_or(SyncError::DetachedHead)?;
        if self.settings.branches.is_protected(&branch) {
            return Err(SyncError::ProtectedBranch { branch });
        }
        writeln!(self.out, "On branch {}", branch.bold())?;
        Ok(RepositoryContext::new(branch))
    }

    fn ensure_remote(&mut self, context: &mut RepositoryContext) -> SyncResult<()> {
        debug!("state: RemoteCheck");
        context.refresh_remotes(&*self.vcs)?;

        let remote = self.settings.upstream.remote.clone();
        if context.has_remote(&remote) {
            return Ok(());
        }

        let url = self.settings.upstream.url.clone();
        writeln!(self.out, "Remote '{}' is not configured.", remote)?;
        let question = format!("Add '{}' pointing at {}?", remote, url);
        if !self.prompter.confirm(&question)? {
            return Err(SyncError::MissingRemote { remote });
        }

        self.vcs.add_remote(&remote, &url)?;
        context.refresh_remotes(&*self.vcs)?;
        if !context.has_remote(&remote) {
            return Err(SyncError::MissingRemote { remote });
        }
        writeln!(self.out, "Added remote '{}'.", remote)?;
        Ok(())
    }

    fn fetch(&mut self) -> SyncResult<()> {
        debug!("state: Fetch");
        let remote = self.settings.upstream.remote.clone();
        writeln!(self.out, "Fetching from '{}'...", remote)?;
        self.vcs
            .fetch(&remote)
            .map_err(|source| SyncError::Fetch { remote, source })
    }

    fn ensure_clean(&mut self, context: &mut RepositoryContext) -> SyncResult<()> {
        debug!("state: DirtyCheck");
        context.refresh_dirty(&*self.vcs)?;
        if !context.dirty {
            return Ok(());
        }

        writeln!(self.out, "You have uncommitted changes.")?;
        if !self.prompter.confirm("Stash them for the duration of this session?")? {
            return Err(SyncError::UncommittedChanges);
        }

        let label = stash_label(Local::now());
        if !self.vcs.stash_push(&label)? {
            return Err(SyncError::UncommittedChanges);
        }
        self.state.record_stash(label.clone());
        writeln!(self.out, "Stashed changes as '{}'.", label)?;

        context.refresh_dirty(&*self.vcs)?;
        if context.dirty {
            warn!("working tree still dirty after stashing");
            return Err(SyncError::UncommittedChanges);
        }
        Ok(())
    }

    fn choose_method(&mut self) -> SyncResult<ResolutionMethod> {
        debug!("state: MethodChoice");
        writeln!(self.out, "How do you want to bring in upstream changes?")?;
        writeln!(self.out, "  1) Rebase (linear history, needs a force push)")?;
        writeln!(self.out, "  2) Merge (keeps history, adds a merge commit)")?;

        let answer = self.prompter.ask("Choose 1 or 2:")?;
        ResolutionMethod::from_menu(&answer).ok_or_else(|| SyncError::InvalidChoice {
            input: answer.trim().to_string(),
        })
    }

    fn integrate_upstream(
        &mut self,
        method: ResolutionMethod,
        branch: &str,
    ) -> SyncResult<Outcome> {
        let target = self.settings.upstream.target();
        debug!("state: Integrate ({} onto {})", method, target);
        writeln!(self.out, "Running {} against {}...", method, target)?;

        match self.vcs.integrate(method, &target)? {
            IntegrationStatus::Clean => self.cleanup(method, branch),
            IntegrationStatus::Stopped { detail } => self.stopped(method, detail, branch),
        }
    }

    /// Put the autostash back when the session fails before integrating
    fn release_stash(&mut self) {
        let Some(label) = self.state.pending_stash().map(str::to_string) else {
            return;
        };
        debug!("session failed before integrating, restoring {}", label);
        if let Err(e) = self.restore_stash(label) {
            warn!("could not report stash restore: {}", e);
        }
    }

    /// The branch may be mid-integration, so the stash stays where it is
    fn keep_stash_for_user(&mut self) {
        if let StashStatus::LeftForUser { label } = self.state.leave_for_user() {
            if let Err(e) = self.print_stash_notice(&label) {
                warn!("could not report stash {}: {}", label, e);
            }
        }
    }

    fn print_stash_notice(&mut self, label: &str) -> SyncResult<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Your uncommitted changes are stashed as '{}'. Restore them with 'git stash pop' once you are done.",
            label
        )?;
        Ok(())
    }

    fn stopped(
        &mut self,
        method: ResolutionMethod,
        detail: String,
        branch: &str,
    ) -> SyncResult<Outcome> {
        let conflicts = ConflictSet::from_paths(self.vcs.unmerged_paths()?);
        if conflicts.is_empty() {
            return Err(SyncError::IntegrationFailed { method, detail });
        }
        self.report_conflicts(method, conflicts, branch)
    }

    fn report_conflicts(
        &mut self,
        method: ResolutionMethod,
        conflicts: ConflictSet,
        branch: &str,
    ) -> SyncResult<Outcome> {
        debug!("state: ConflictReport ({} paths)", conflicts.len());

        writeln!(self.out)?;
        writeln!(
            self.out,
            "{}",
            format!("Conflicts in {} file(s):", conflicts.len())
                .red()
                .bold()
        )?;
        for path in conflicts.iter() {
            writeln!(self.out, "  {}", path)?;
        }

        writeln!(self.out)?;
        writeln!(self.out, "To finish:")?;
        writeln!(
            self.out,
            "  1. Edit each file above and remove the conflict markers"
        )?;
        writeln!(
            self.out,
            "  2. git add <file>...   (paths are relative to the repository root)"
        )?;
        writeln!(
            self.out,
            "  3. {}   (or: syncup continue)",
            method.continue_command()
        )?;
        writeln!(
            self.out,
            "  4. {}   (once the {} is complete)",
            method.push_command(branch),
            method
        )?;
        writeln!(self.out, "To abort:")?;
        writeln!(self.out, "  {}", method.abort_command())?;

        let stash = self.state.leave_for_user();
        if let StashStatus::LeftForUser { label } = &stash {
            self.print_stash_notice(label)?;
        }

        self.offer_editor(&conflicts)?;

        Ok(Outcome::ConflictsReported {
            method,
            conflicts,
            stash,
        })
    }

    fn offer_editor(&mut self, conflicts: &ConflictSet) -> SyncResult<()> {
        if !self.settings.open_editor {
            return Ok(());
        }
        let Some(editor) = select_editor(
            &self.settings.editors,
            self.settings.env_editor.as_deref(),
            &*self.launcher,
        ) else {
            debug!("no editor available");
            return Ok(());
        };

        let question = format!("Open the conflicted files in {}?", editor.display());
        if !self.prompter.confirm(&question)? {
            return Ok(());
        }

        if let Err(e) = self.launcher.launch(&editor, conflicts.paths()) {
            writeln!(
                self.out,
                "{} could not start {}: {}",
                "warning:".yellow().bold(),
                editor.display(),
                e
            )?;
        }
        Ok(())
    }

    fn cleanup(&mut self, method: ResolutionMethod, branch: &str) -> SyncResult<Outcome> {
        debug!("state: Cleanup");
        writeln!(
            self.out,
            "{}",
            format!("The {} finished without conflicts.", method).green()
        )?;

        let stash = match self.state.pending_stash().map(str::to_string) {
            None => StashStatus::NotCreated,
            Some(label) => self.restore_stash(label)?,
        };

        self.print_push_guidance(method, branch)?;
        Ok(Outcome::Integrated { method, stash })
    }

    fn restore_stash(&mut self, label: String) -> SyncResult<StashStatus> {
        match self.vcs.stash_pop(&label) {
            Ok(StashRestore::Restored) => {
                self.state.restored = true;
                writeln!(self.out, "Restored your stashed changes ('{}').", label)?;
                Ok(StashStatus::Restored { label })
            }
            Ok(StashRestore::Conflicted) => {
                writeln!(
                    self.out,
                    "{} restoring '{}' produced conflicts. Resolve them by hand; the stash entry was kept in 'git stash list'.",
                    "warning:".yellow().bold(),
                    label
                )?;
                Ok(StashStatus::Conflicted { label })
            }
            Err(e) => {
                warn!("stash pop failed: {}", e);
                writeln!(
                    self.out,
                    "{} could not restore '{}': {}. It is still in 'git stash list'.",
                    "warning:".yellow().bold(),
                    label,
                    e
                )?;
                Ok(StashStatus::LeftForUser { label })
            }
        }
    }

    fn print_push_guidance(&mut self, method: ResolutionMethod, branch: &str) -> SyncResult<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Publish your branch with:")?;
        writeln!(self.out, "  {}", method.push_command(branch))?;
        if method == ResolutionMethod::Rebase {
            writeln!(
                self.out,
                "The rebase rewrote history, so --force-with-lease is required."
            )?;
        }
        Ok(())
    }
}
