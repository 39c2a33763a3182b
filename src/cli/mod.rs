use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, LevelFilter};

use crate::config::SyncConfig;
use crate::core::{Orchestrator, Outcome, Settings};
use crate::editor::SystemLauncher;
use crate::error::SyncError;
use crate::prompt::TerminalPrompter;
use crate::vcs::GitCli;

/// Bring upstream changes into your branch and hand back any conflicts
#[derive(Debug, Parser)]
#[command(name = "syncup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print debug output for every step and git invocation
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: .syncup.toml, then ~/.config/syncup/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Never offer to open an editor on conflicted files
    #[arg(long)]
    pub no_editor: bool,

    /// Upstream remote name
    #[arg(long)]
    pub remote: Option<String>,

    /// URL used if the upstream remote has to be added
    #[arg(long)]
    pub url: Option<String>,

    /// Upstream branch to rebase onto or merge
    #[arg(long)]
    pub branch: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Finish a rebase or merge after resolving its conflicts
    Continue,

    /// Abort the rebase or merge in progress
    Abort,
}

impl Cli {
    fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(remote) = &self.remote {
            config.upstream.remote = remote.clone();
        }
        if let Some(url) = &self.url {
            config.upstream.url = url.clone();
        }
        if let Some(branch) = &self.branch {
            config.upstream.branch = branch.clone();
        }
        if self.no_editor {
            config.editor.enabled = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::builder().filter_level(level).init();
}

fn init_color() {
    if env::var_os("NO_COLOR").is_some() || !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }
}

fn load_config(cli: &Cli, git: &GitCli) -> Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::load_from_file(path)?,
        None => SyncConfig::load(git.workdir())?,
    };
    cli.apply_overrides(&mut config);
    Ok(config)
}

fn report_error(err: &SyncError) {
    eprintln!("{} {}", "error:".red().bold(), err);
    eprintln!("{} {}", "hint:".cyan(), err.hint());
}

/// Run the CLI
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    init_color();

    let workdir = env::current_dir().context("Failed to read current directory")?;
    let mut git = GitCli::discover(workdir).context("Failed to locate repository root")?;
    let config = load_config(&cli, &git)?;
    debug!("config: {:?}", config);

    let settings = Settings::from_config(&config, env::var("EDITOR").ok());
    let mut prompter = TerminalPrompter;
    let mut launcher = SystemLauncher::in_dir(git.workdir());
    let stdout = io::stdout();

    let mut orchestrator = Orchestrator::new(
        &mut git,
        &mut prompter,
        &mut launcher,
        stdout.lock(),
        settings,
    );

    let result = match cli.command {
        None => orchestrator.run().map(log_outcome),
        Some(Commands::Continue) => orchestrator.resume().map(log_outcome),
        Some(Commands::Abort) => orchestrator.abort().map(|_| ()),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            report_error(&e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

fn log_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Integrated { method, stash } => {
            debug!("{} integrated, stash: {:?}", method, stash)
        }
        Outcome::ConflictsReported {
            method, conflicts, ..
        } => debug!(
            "{} stopped with {} conflicted path(s)",
            method,
            conflicts.len()
        ),
    }
}
