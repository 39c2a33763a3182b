//! Configuration for syncup
//!
//! Supports loading from `.syncup.toml` (repo) or `~/.config/syncup/config.toml` (global).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the repo-local config file
pub const REPO_CONFIG_FILE: &str = ".syncup.toml";

/// Full syncup configuration file
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Where upstream changes come from
    pub upstream: UpstreamConfig,

    /// Branch rules
    pub branches: BranchConfig,

    /// Editor used for conflicted files
    pub editor: EditorConfig,
}

/// Upstream remote settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Remote name
    pub remote: String,

    /// URL used when the remote has to be added
    pub url: String,

    /// Upstream default branch
    pub branch: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            remote: "upstream".to_string(),
            url: "https://github.com/github/docs.git".to_string(),
            branch: "main".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Ref to rebase onto or merge, e.g. `upstream/main`
    pub fn target(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BranchConfig {
    /// Branches syncup refuses to integrate into
    pub protected: Vec<String>,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            protected: vec!["main".to_string(), "master".to_string()],
        }
    }
}

impl BranchConfig {
    pub fn is_protected(&self, branch: &str) -> bool {
        self.protected.iter().any(|p| p == branch)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Offer to open conflicted files
    pub enabled: bool,

    /// Preferred graphical editor
    pub visual: Option<String>,

    /// Terminal editor tried after the visual one
    pub terminal: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            visual: Some("code".to_string()),
            terminal: Some("vim".to_string()),
        }
    }
}

impl EditorConfig {
    /// Configured editors in priority order
    pub fn candidates(&self) -> Vec<String> {
        [&self.visual, &self.terminal]
            .into_iter()
            .flatten()
            .filter(|e| !e.trim().is_empty())
            .cloned()
            .collect()
    }
}

impl SyncConfig {
    /// Load configuration from repo root, falling back to global config
    pub fn load(repo_root: &Path) -> Result<Self> {
        let repo_config = Self::repo_config_path(repo_root);
        if repo_config.exists() {
            return Self::load_from_file(&repo_config);
        }

        if let Some(global_config) = Self::global_config_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get global config path (~/.config/syncup/config.toml)
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("syncup").join("config.toml"))
    }

    pub fn repo_config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(REPO_CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.upstream.remote, "upstream");
        assert_eq!(config.upstream.branch, "main");
        assert_eq!(config.upstream.target(), "upstream/main");
        assert!(config.branches.is_protected("main"));
        assert!(config.branches.is_protected("master"));
        assert!(!config.branches.is_protected("feature/x"));
        assert!(config.editor.enabled);
        assert_eq!(config.editor.candidates(), vec!["code", "vim"]);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[upstream]
remote = "source"
url = "https://example.com/project.git"
branch = "trunk"

[branches]
protected = ["trunk", "release"]

[editor]
enabled = false
visual = "subl -w"
"#;

        let config: SyncConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.upstream.target(), "source/trunk");
        assert_eq!(config.upstream.url, "https://example.com/project.git");
        assert!(config.branches.is_protected("release"));
        assert!(!config.branches.is_protected("main"));
        assert!(!config.editor.enabled);
        // unset keys keep their defaults
        assert_eq!(config.editor.candidates(), vec!["subl -w", "vim"]);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: SyncConfig = toml::from_str("[upstream]\nbranch = \"develop\"\n").unwrap();
        assert_eq!(config.upstream.remote, "upstream");
        assert_eq!(config.upstream.target(), "upstream/develop");
        assert_eq!(config.branches, BranchConfig::default());
    }

    #[test]
    fn test_blank_editors_skipped() {
        let editor = EditorConfig {
            enabled: true,
            visual: Some(" ".to_string()),
            terminal: None,
        };
        assert!(editor.candidates().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(REPO_CONFIG_FILE);

        std::fs::write(
            &config_path,
            r#"
[upstream]
remote = "canonical"
"#,
        )
        .unwrap();

        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.upstream.remote, "canonical");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(REPO_CONFIG_FILE);
        std::fs::write(&config_path, "[upstream\nremote = 1").unwrap();

        let err = SyncConfig::load_from_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}
