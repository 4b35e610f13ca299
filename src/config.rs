//! Configuration loading and defaults.
//!
//! The config lives in `codegraph.toml` at the project root. Commands other
//! than `init` discover it by walking up from the working directory; every
//! field has a default so a missing file means "defaults at the current
//! directory", not an error.

use crate::error::{CodegraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the on-disk configuration file.
pub const CONFIG_FILE_NAME: &str = "codegraph.toml";

/// Hidden directory holding the store and the content-hash journal.
pub const DATA_DIR_NAME: &str = ".codegraph";

fn default_exclude_patterns() -> Vec<String> {
    [
        "__pycache__",
        "*.pyc",
        ".git",
        "node_modules",
        ".venv",
        "venv",
        "dist",
        "target",
        DATA_DIR_NAME,
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DATA_DIR_NAME).join("graph.kuzu")
}

fn default_batch_size() -> usize {
    1000
}

fn default_query_timeout_secs() -> u64 {
    30
}

/// Parsing section: discovery filters and front-end options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// Glob patterns excluded from discovery (matched against file names,
    /// full paths, and directory names).
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Files above this size are skipped (their File entity is still created).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Follow symlinks during discovery. Off by default.
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Capture docstrings as entity properties.
    #[serde(default = "default_true")]
    pub include_docstrings: bool,

    /// Additional source roots for import resolution, relative to the
    /// project root. The project root itself is always a source root.
    #[serde(default)]
    pub source_roots: Vec<PathBuf>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        ParsingConfig {
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
            follow_symlinks: false,
            include_docstrings: true,
            source_roots: Vec::new(),
        }
    }
}

/// Database section: store location and write/query limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Store directory, relative to the project root unless absolute.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Rows per write batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-call read query deadline in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_store_path(),
            batch_size: default_batch_size(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// Main configuration for a codegraph project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodegraphConfig {
    /// Parsing and discovery options.
    #[serde(default)]
    pub parsing: ParsingConfig,

    /// Store options.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Project root. Not serialized; set from the config file location or
    /// the working directory.
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl CodegraphConfig {
    /// Build a default config rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        CodegraphConfig {
            project_root: root.into(),
            ..CodegraphConfig::default()
        }
    }

    /// Load the config at an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| CodegraphError::io(path, e))?;
        let mut config: CodegraphConfig =
            toml::from_str(&data).map_err(|e| CodegraphError::Config {
                message: format!("{}: {e}", path.display()),
            })?;
        config.project_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Find and load the config by walking up from `start`. Falls back to
    /// defaults rooted at `start` when no config file exists.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
            dir = current.parent();
        }
        Ok(CodegraphConfig::with_root(start))
    }

    /// Write the config to `<root>/codegraph.toml`.
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.project_root.join(CONFIG_FILE_NAME);
        let data = toml::to_string_pretty(self).map_err(|e| CodegraphError::Config {
            message: format!("serialize: {e}"),
        })?;
        std::fs::write(&path, data).map_err(|e| CodegraphError::io(&path, e))?;
        Ok(path)
    }

    /// Absolute store path.
    pub fn store_path(&self) -> PathBuf {
        if self.database.path.is_absolute() {
            self.database.path.clone()
        } else {
            self.project_root.join(&self.database.path)
        }
    }

    /// Absolute path of the content-hash journal, a sibling of the store.
    pub fn journal_path(&self) -> PathBuf {
        let store = self.store_path();
        let parent = store.parent().unwrap_or(Path::new("."));
        parent.join("hashes.json")
    }

    /// Absolute source roots for import resolution.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.project_root.clone()];
        for extra in &self.parsing.source_roots {
            if extra.is_absolute() {
                roots.push(extra.clone());
            } else {
                roots.push(self.project_root.join(extra));
            }
        }
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CodegraphConfig::default();
        assert_eq!(config.parsing.max_file_size, 1024 * 1024);
        assert_eq!(config.database.batch_size, 1000);
        assert_eq!(config.database.query_timeout_secs, 30);
        assert!(!config.parsing.follow_symlinks);
        assert!(config.parsing.include_docstrings);
    }

    #[test]
    fn roundtrip_through_toml() {
        let config = CodegraphConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: CodegraphConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.parsing.exclude_patterns, config.parsing.exclude_patterns);
        assert_eq!(back.database.path, config.database.path);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let back: CodegraphConfig = toml::from_str("[parsing]\nfollow_symlinks = true\n").unwrap();
        assert!(back.parsing.follow_symlinks);
        assert_eq!(back.database.batch_size, 1000);
    }

    #[test]
    fn discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        let config = CodegraphConfig::with_root(dir.path());
        config.save().unwrap();

        let found = CodegraphConfig::discover(&nested).unwrap();
        assert_eq!(found.project_root, dir.path());
    }
}
