//! Editor discovery and launch for conflicted files

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

/// Program plus leading arguments, e.g. `code --wait`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EditorCommand {
    /// Split a command line such as the value of `$EDITOR`
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Checks for and starts editor processes
pub trait Launcher {
    /// Whether `program` can be found on the execution path
    fn is_available(&self, program: &str) -> bool;

    fn launch(&mut self, editor: &EditorCommand, paths: &[String]) -> io::Result<()>;
}

/// Uses `PATH` and real child processes
#[derive(Debug, Default)]
pub struct SystemLauncher {
    /// Directory conflicted paths are relative to
    workdir: Option<PathBuf>,
}

impl SystemLauncher {
    /// Start editors in `workdir`, normally the repository root
    pub fn in_dir(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: Some(workdir.into()),
        }
    }
}

impl Launcher for SystemLauncher {
    fn is_available(&self, program: &str) -> bool {
        find_on_path(program, env::var_os("PATH").as_deref())
    }

    fn launch(&mut self, editor: &EditorCommand, paths: &[String]) -> io::Result<()> {
        debug!("launching {} on {} file(s)", editor.display(), paths.len());
        let mut command = Command::new(&editor.program);
        command.args(&editor.args).args(paths);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }
        let status = command.status()?;

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {}", editor.program, status),
            ))
        }
    }
}

fn find_on_path(program: &str, path_var: Option<&std::ffi::OsStr>) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    let Some(path_var) = path_var else {
        return false;
    };
    env::split_paths(path_var).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

/// Pick the editor to open conflicts with
///
/// Configured candidates are tried in order and must be on `PATH`; the
/// environment editor is the last resort and is used as given.
pub fn select_editor(
    candidates: &[String],
    env_editor: Option<&str>,
    launcher: &dyn Launcher,
) -> Option<EditorCommand> {
    candidates
        .iter()
        .filter_map(|c| EditorCommand::parse(c))
        .find(|c| launcher.is_available(&c.program))
        .or_else(|| env_editor.and_then(EditorCommand::parse))
}
