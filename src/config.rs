//! config
//!
//! Engine configuration: default fix behavior, where to look for check
//! packs, and the path-template engine's repo override.
//!
//! # Architecture
//!
//! Grounded on the teacher's `core::config` — a `serde`-deserialized TOML
//! struct with an explicit precedence chain (CLI flag > environment
//! variable > project config file > user config file > built-in default),
//! plus a `thiserror` enum for the handful of ways loading it can fail.
//!
//! # Invariants
//!
//! - Loading a config file that doesn't exist is not an error: it's
//!   treated as "use defaults", matching the optional-file precedence
//!   every layer below it already assumes.
//! - `try_fix` defaults to `false`: an engine that silently mutates the
//!   system it's checking by default would be a surprising default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while locating or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Engine-wide configuration.
///
/// Every field has a sensible default so a host can construct this with
/// `EngineConfig::default()` and run immediately, layering in a config
/// file only when one is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether `_fix` hooks run automatically on a `not_passed` result.
    pub try_fix: bool,

    /// Directories scanned for check-pack dynamic libraries, in order.
    pub repo_paths: Vec<PathBuf>,

    /// Overrides the path-template engine's own repo directory; falls
    /// back to the `FOLDERSTRUCTURE_REPO` environment variable, then a
    /// built-in default, when unset (see [`crate::pathengine`]).
    pub pathengine_repo: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            try_fix: false,
            repo_paths: Vec::new(),
            pathengine_repo: None,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `path`, falling back to defaults if the
    /// file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// The conventional per-user config path (`$XDG_CONFIG_HOME/sanicheck/config.toml`
    /// or platform equivalent via the `dirs` crate), if one can be determined.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sanicheck").join("config.toml"))
    }

    /// Merges `override_config` on top of `self`, field by field, letting
    /// a more specific layer (e.g. a project-local file) win over a more
    /// general one (e.g. the user config) without requiring the caller to
    /// know which fields changed.
    pub fn merge(mut self, override_config: EngineConfig) -> Self {
        self.try_fix = override_config.try_fix;
        if !override_config.repo_paths.is_empty() {
            self.repo_paths = override_config.repo_paths;
        }
        if override_config.pathengine_repo.is_some() {
            self.pathengine_repo = override_config.pathengine_repo;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_never_fixes_and_has_no_repo_paths() {
        let config = EngineConfig::default();
        assert!(!config.try_fix);
        assert!(config.repo_paths.is_empty());
        assert!(config.pathengine_repo.is_none());
    }

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let config = EngineConfig::load(Path::new("/nonexistent/sanicheck/config.toml")).unwrap();
        assert!(!config.try_fix);
    }

    #[test]
    fn load_parses_toml_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "try_fix = true\nrepo_paths = [\"/opt/checks\"]\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert!(config.try_fix);
        assert_eq!(config.repo_paths, vec![PathBuf::from("/opt/checks")]);
    }

    #[test]
    fn merge_lets_override_win_for_set_fields_only() {
        let base = EngineConfig {
            try_fix: false,
            repo_paths: vec![PathBuf::from("/base")],
            pathengine_repo: Some(PathBuf::from("/base/paths")),
        };
        let override_config = EngineConfig {
            try_fix: true,
            repo_paths: Vec::new(),
            pathengine_repo: None,
        };
        let merged = base.merge(override_config);
        assert!(merged.try_fix);
        assert_eq!(merged.repo_paths, vec![PathBuf::from("/base")]);
        assert_eq!(merged.pathengine_repo, Some(PathBuf::from("/base/paths")));
    }
}
