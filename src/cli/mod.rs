//! cli
//!
//! Command-line interface layer for the `sanicheck` binary.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration, then delegate to [`commands::dispatch`]
//! - Never touches a [`crate::engine::Engine`] directly — that happens one
//!   layer down, per subcommand
//!
//! # Architecture
//!
//! The CLI layer is thin: parse with clap, resolve config precedence
//! (CLI flag > env > project config > user config > built-in default),
//! and dispatch. All check/context execution flows through
//! [`crate::engine::Engine`] and [`crate::runner`].

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::Result;

use crate::config::EngineConfig;
use crate::ui::output::Verbosity;

/// Run the CLI application. This is the entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => match EngineConfig::user_config_path() {
            Some(path) => EngineConfig::load(&path)?,
            None => EngineConfig::default(),
        },
    };

    commands::dispatch(cli.command, &cli.repos, &config, verbosity)
}
