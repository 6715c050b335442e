//! `FolderStructure` — a repo directory of declared tokens and templates,
//! loaded once and then used to parse/solve concrete paths.
//!
//! # Architecture
//!
//! Grounded on `original_source/FolderStructure/folderstructure.py`: a
//! single `folderstructure.conf` JSON file declares every token and
//! template for a project layout. The source also supports standalone
//! `.token`/`.template` files for ad-hoc additions alongside the main
//! config; this crate keeps that same "conf plus loose files" loading
//! order; files loaded later override an earlier declaration of the same
//! name, and `.template` files are naturally excluded from consideration
//! as a check pack by [`crate::loader`] (`.so`/`.dylib`/`.dll` filtering).
//!
//! Repo discovery order (first one found wins):
//! 1. An explicit path passed to [`FolderStructure::load`].
//! 2. [`crate::config::EngineConfig::pathengine_repo`].
//! 3. The `FOLDERSTRUCTURE_REPO` environment variable.
//! 4. `$XDG_CONFIG_HOME/sanicheck/folderstructure` (via the `dirs` crate).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::EngineConfig;
use crate::pathengine::error::PathEngineError;
use crate::pathengine::template::{Anchor, Template};
use crate::pathengine::token::{Token, DEFAULT_PATTERN};

const CONFIG_FILE_NAME: &str = "folderstructure.conf";
const REPO_ENV_VAR: &str = "FOLDERSTRUCTURE_REPO";

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    tokens: HashMap<String, RawToken>,
    #[serde(default)]
    templates: HashMap<String, RawTemplate>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTemplate {
    Pattern(String),
    Detailed { pattern: String, #[serde(default)] anchor_start_only: bool },
}

/// A token declaration: either a bare regex pattern (the `default` the
/// source's wire format calls it), or an enumerated friendly-value -> code
/// `options` mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawToken {
    Pattern(String),
    Detailed {
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        options: HashMap<String, String>,
    },
}

/// A loaded set of tokens and templates.
pub struct FolderStructure {
    tokens: HashMap<String, Token>,
    templates: HashMap<String, Template>,
}

impl FolderStructure {
    /// Resolves the repo directory per the precedence above and loads it.
    pub fn discover(config: &EngineConfig) -> Result<Self, PathEngineError> {
        let candidates = [
            config.pathengine_repo.clone(),
            std::env::var(REPO_ENV_VAR).ok().map(PathBuf::from),
            dirs::config_dir().map(|dir| dir.join("sanicheck").join("folderstructure")),
        ];
        for candidate in candidates.into_iter().flatten() {
            if candidate.join(CONFIG_FILE_NAME).is_file() {
                return Self::load(&candidate);
            }
        }
        Err(PathEngineError::RepoNotFound(PathBuf::from(CONFIG_FILE_NAME)))
    }

    /// Loads a repo directory directly, bypassing discovery precedence.
    pub fn load(repo: &Path) -> Result<Self, PathEngineError> {
        let config_path = repo.join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&config_path).map_err(|source| PathEngineError::Read {
            path: config_path.clone(),
            source,
        })?;
        let raw: RawConfig = serde_json::from_str(&contents).map_err(|source| PathEngineError::Parse {
            path: config_path.clone(),
            source,
        })?;

        let mut tokens: HashMap<String, Token> = raw
            .tokens
            .into_iter()
            .map(|(name, raw_token)| {
                let token = match raw_token {
                    RawToken::Pattern(pattern) => Token::new(name.clone(), pattern),
                    RawToken::Detailed { options, .. } if !options.is_empty() => {
                        Token::with_options(name.clone(), options)
                    }
                    RawToken::Detailed { default, .. } => {
                        Token::new(name.clone(), default.unwrap_or_else(|| DEFAULT_PATTERN.to_string()))
                    }
                };
                (name, token)
            })
            .collect();

        let mut templates: HashMap<String, Template> = raw
            .templates
            .into_iter()
            .map(|(name, raw_template)| {
                let (pattern, anchor) = match raw_template {
                    RawTemplate::Pattern(pattern) => (pattern, Anchor::BOTH),
                    RawTemplate::Detailed { pattern, anchor_start_only } => {
                        (pattern, if anchor_start_only { Anchor::START } else { Anchor::BOTH })
                    }
                };
                (name.clone(), Template::new(name, pattern, anchor))
            })
            .collect();

        Self::load_loose_files(repo, &mut tokens, &mut templates)?;

        Ok(Self { tokens, templates })
    }

    fn load_loose_files(
        repo: &Path,
        tokens: &mut HashMap<String, Token>,
        templates: &mut HashMap<String, Template>,
    ) -> Result<(), PathEngineError> {
        let Ok(entries) = std::fs::read_dir(repo) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            match path.extension().and_then(|e| e.to_str()) {
                Some("token") => {
                    let pattern = std::fs::read_to_string(&path).map_err(|source| PathEngineError::Read {
                        path: path.clone(),
                        source,
                    })?;
                    tokens.insert(stem.clone(), Token::new(stem, pattern.trim().to_string()));
                }
                Some("template") => {
                    let pattern = std::fs::read_to_string(&path).map_err(|source| PathEngineError::Read {
                        path: path.clone(),
                        source,
                    })?;
                    templates.insert(stem.clone(), Template::new(stem, pattern.trim().to_string(), Anchor::BOTH));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn tokens(&self) -> &HashMap<String, Token> {
        &self.tokens
    }

    pub fn templates(&self) -> &HashMap<String, Template> {
        &self.templates
    }

    pub fn parse(&self, template_name: &str, path: &str) -> Result<HashMap<String, String>, PathEngineError> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| PathEngineError::UnknownTemplate(template_name.to_string()))?;
        template.parse(path, &self.tokens, &self.templates)
    }

    pub fn solve(&self, template_name: &str, data: &HashMap<String, String>) -> Result<String, PathEngineError> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| PathEngineError::UnknownTemplate(template_name.to_string()))?;
        template.solve(data, &self.tokens, &self.templates)
    }
}
