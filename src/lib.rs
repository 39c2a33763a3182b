pub mod cli;
pub mod config;
pub mod core;
pub mod editor;
pub mod error;
pub mod prompt;
pub mod vcs;

pub use crate::core::{Orchestrator, Outcome, ResolutionMethod, Settings};
pub use config::SyncConfig;
pub use error::{SyncError, VcsError};
pub use vcs::{GitCli, VersionControl};
