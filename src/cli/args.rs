//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--repo <path>`: Directory to scan for check packs (may repeat)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sanicheck - a pluggable sanity-check orchestration engine
#[derive(Parser, Debug)]
#[command(name = "sanicheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan for check-pack dynamic libraries (repeatable).
    /// Defaults to the paths configured in `EngineConfig::repo_paths`.
    #[arg(long = "repo", global = true, value_name = "DIR")]
    pub repos: Vec<PathBuf>,

    /// Path to a TOML config file; defaults to the per-user config path.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every check found across all configured repos.
    Run {
        /// Attempt `_fix` on any check that comes back `not_passed`.
        #[arg(long)]
        try_fix: bool,
    },

    /// Run a single check by name (and its dependencies).
    #[command(name = "run-check")]
    RunCheck {
        /// The check's registered name.
        name: String,

        /// Attempt `_fix` if the check comes back `not_passed`.
        #[arg(long)]
        try_fix: bool,
    },

    /// List every registered check and context, with current status.
    List {
        /// Print as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Path template engine operations.
    Pathengine {
        #[command(subcommand)]
        action: PathEngineAction,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `pathengine` subcommands.
#[derive(Subcommand, Debug)]
pub enum PathEngineAction {
    /// Parse a concrete path against a named template, printing its fields.
    Parse {
        /// Registered template name.
        template: String,
        /// The path to parse.
        path: String,
        /// Print as JSON instead of `key=value` lines.
        #[arg(long)]
        json: bool,
    },

    /// Solve a named template into a concrete path from `key=value` fields.
    Solve {
        /// Registered template name.
        template: String,
        /// `key=value` pairs supplying every placeholder in the template.
        #[arg(value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

/// Supported shells for completion.
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
