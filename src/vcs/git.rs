//! `git` executable backend

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::debug;

use super::{IntegrationStatus, StashRestore, VersionControl};
use crate::core::session::ResolutionMethod;
use crate::error::VcsError;

/// Runs `git` in a fixed working directory
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            program: "git".to_string(),
        }
    }

    /// Backend rooted at the top of the working tree containing `start`
    ///
    /// Unmerged paths are reported relative to the root, so running every
    /// command from there keeps them valid for the editor and for `git add`.
    /// Outside a repository the backend stays at `start`.
    pub fn discover(start: impl Into<PathBuf>) -> Result<Self, VcsError> {
        let probe = Self::new(start);
        match probe.toplevel()? {
            Some(root) => Ok(Self::new(root)),
            None => Ok(probe),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Root of the working tree, `None` outside a repository
    pub fn toplevel(&self) -> Result<Option<PathBuf>, VcsError> {
        let output = self.output(&["rev-parse", "--show-toplevel"], &[])?;
        if !output.status.success() {
            return Ok(None);
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(PathBuf::from(root)))
    }

    fn describe(args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }

    /// Run git and hand back the raw output, whatever the exit status
    fn output(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<Output, VcsError> {
        let mut command = Command::new(&self.program);
        command.args(args).current_dir(&self.workdir);
        for (key, value) in envs {
            command.env(key, value);
        }

        let output = command.output().map_err(|source| VcsError::Spawn {
            command: Self::describe(args),
            source,
        })?;

        debug!("{} -> {}", Self::describe(args), output.status);
        Ok(output)
    }

    /// Run git and return stdout, failing on a non-zero exit
    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.output(args, &[])?;
        if !output.status.success() {
            return Err(VcsError::Failed {
                command: Self::describe(args),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn stopping_run(
        &self,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<IntegrationStatus, VcsError> {
        let output = self.output(args, envs)?;
        if output.status.success() {
            Ok(IntegrationStatus::Clean)
        } else {
            Ok(IntegrationStatus::Stopped {
                detail: combined_detail(&output),
            })
        }
    }

    fn git_path_exists(&self, name: &str) -> Result<bool, VcsError> {
        let relative = self.run(&["rev-parse", "--git-path", name])?;
        let path = self.workdir.join(relative.trim());
        Ok(path.exists())
    }

    fn stash_ref(&self, label: &str) -> Result<Option<String>, VcsError> {
        let listing = self.run(&["stash", "list", "--format=%gd%x09%gs"])?;
        Ok(find_stash_ref(&listing, label))
    }
}

impl VersionControl for GitCli {
    fn is_work_tree(&self) -> Result<bool, VcsError> {
        let output = self.output(&["rev-parse", "--is-inside-work-tree"], &[])?;
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    fn current_branch(&self) -> Result<Option<String>, VcsError> {
        let output = self.output(&["symbolic-ref", "--quiet", "--short", "HEAD"], &[])?;
        if !output.status.success() {
            // --quiet: exit 1 with no output means detached HEAD
            if output.stderr.is_empty() {
                return Ok(None);
            }
            return Err(VcsError::Failed {
                command: "git symbolic-ref --quiet --short HEAD".to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(branch))
    }

    fn remotes(&self) -> Result<BTreeMap<String, String>, VcsError> {
        let listing = self.run(&["remote", "-v"])?;
        Ok(parse_remotes(&listing))
    }

    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), VcsError> {
        self.run(&["remote", "add", name, url])?;
        Ok(())
    }

    fn fetch(&mut self, remote: &str) -> Result<(), VcsError> {
        self.run(&["fetch", remote])?;
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool, VcsError> {
        let status = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(status.lines().any(|line| !line.trim().is_empty()))
    }

    fn stash_push(&mut self, label: &str) -> Result<bool, VcsError> {
        self.run(&["stash", "push", "-m", label])?;
        Ok(self.stash_ref(label)?.is_some())
    }

    fn stash_pop(&mut self, label: &str) -> Result<StashRestore, VcsError> {
        let stash = self
            .stash_ref(label)?
            .ok_or_else(|| VcsError::StashNotFound {
                label: label.to_string(),
            })?;

        let args = ["stash", "pop", stash.as_str()];
        let output = self.output(&args, &[])?;
        if output.status.success() {
            return Ok(StashRestore::Restored);
        }

        if !self.unmerged_paths()?.is_empty() {
            return Ok(StashRestore::Conflicted);
        }

        Err(VcsError::Failed {
            command: Self::describe(&args),
            status: output.status,
            stderr: combined_detail(&output),
        })
    }

    fn integrate(
        &mut self,
        method: ResolutionMethod,
        target: &str,
    ) -> Result<IntegrationStatus, VcsError> {
        match method {
            ResolutionMethod::Rebase => self.stopping_run(&["rebase", target], &[]),
            ResolutionMethod::Merge => self.stopping_run(&["merge", "--no-edit", target], &[]),
        }
    }

    fn unmerged_paths(&self) -> Result<Vec<String>, VcsError> {
        // raw, NUL-terminated names; the default quoting mangles non-ASCII paths
        let listing = self.run(&[
            "-c",
            "core.quotePath=false",
            "diff",
            "--name-only",
            "--diff-filter=U",
            "-z",
        ])?;
        Ok(parse_path_list(&listing))
    }

    fn integration_in_progress(&self) -> Result<Option<ResolutionMethod>, VcsError> {
        if self.git_path_exists("rebase-merge")? || self.git_path_exists("rebase-apply")? {
            return Ok(Some(ResolutionMethod::Rebase));
        }
        if self.git_path_exists("MERGE_HEAD")? {
            return Ok(Some(ResolutionMethod::Merge));
        }
        Ok(None)
    }

    fn continue_rebase(&mut self) -> Result<IntegrationStatus, VcsError> {
        // keep the recorded messages instead of opening an editor per commit
        self.stopping_run(&["rebase", "--continue"], &[("GIT_EDITOR", "true")])
    }

    fn commit_merge(&mut self) -> Result<IntegrationStatus, VcsError> {
        self.stopping_run(&["commit", "--no-edit"], &[])
    }

    fn abort(&mut self, method: ResolutionMethod) -> Result<(), VcsError> {
        match method {
            ResolutionMethod::Rebase => self.run(&["rebase", "--abort"])?,
            ResolutionMethod::Merge => self.run(&["merge", "--abort"])?,
        };
        Ok(())
    }
}

fn combined_detail(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    [stdout.trim(), stderr.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse `git remote -v` into name -> fetch URL
pub(crate) fn parse_remotes(listing: &str) -> BTreeMap<String, String> {
    let mut remotes = BTreeMap::new();
    for line in listing.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        match fields.next() {
            Some("(push)") => {
                remotes
                    .entry(name.to_string())
                    .or_insert_with(|| url.to_string());
            }
            _ => {
                remotes.insert(name.to_string(), url.to_string());
            }
        }
    }
    remotes
}

/// Find the `stash@{n}` ref whose subject ends with `label`
pub(crate) fn find_stash_ref(listing: &str, label: &str) -> Option<String> {
    listing.lines().find_map(|line| {
        let (reference, subject) = line.split_once('\t')?;
        if subject.trim_end().ends_with(label) {
            Some(reference.trim().to_string())
        } else {
            None
        }
    })
}

/// Split `-z` output; names are kept byte for byte
pub(crate) fn parse_path_list(listing: &str) -> Vec<String> {
    listing
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remotes() {
        let listing = "origin\tgit@github.com:me/project.git (fetch)\n\
                       origin\tgit@github.com:me/project.git (push)\n\
                       upstream\thttps://github.com/org/project.git (fetch)\n\
                       upstream\tno_push (push)\n";

        let remotes = parse_remotes(listing);

        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes["origin"], "git@github.com:me/project.git");
        assert_eq!(remotes["upstream"], "https://github.com/org/project.git");
    }

    #[test]
    fn test_parse_remotes_empty() {
        assert!(parse_remotes("").is_empty());
        assert!(parse_remotes("\n\n").is_empty());
    }

    #[test]
    fn test_find_stash_ref() {
        let listing = "stash@{0}\tOn feature/x: syncup-autostash-20260101-101010-abcd1234\n\
                       stash@{1}\tWIP on main: 1234567 older work\n";

        assert_eq!(
            find_stash_ref(listing, "syncup-autostash-20260101-101010-abcd1234"),
            Some("stash@{0}".to_string())
        );
        assert_eq!(find_stash_ref(listing, "syncup-autostash-other"), None);
    }

    #[test]
    fn test_find_stash_ref_deeper_entry() {
        let listing = "stash@{0}\tOn feature/x: manual\n\
                       stash@{1}\tOn feature/x: syncup-autostash-a\n";
        assert_eq!(
            find_stash_ref(listing, "syncup-autostash-a"),
            Some("stash@{1}".to_string())
        );
    }

    #[test]
    fn test_parse_path_list() {
        let paths = parse_path_list("a.json\0caf\u{e9}.json\0 spaced name.txt\0");
        assert_eq!(paths, vec!["a.json", "caf\u{e9}.json", " spaced name.txt"]);
        assert!(parse_path_list("").is_empty());
    }
}
