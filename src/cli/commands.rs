//! cli::commands
//!
//! Per-subcommand handlers. Each function loads every configured repo
//! into a fresh [`Engine`], does the one thing its subcommand asked for,
//! and prints the result through [`crate::ui::output`].

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::args::{Command, PathEngineAction};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::pathengine::FolderStructure;
use crate::progress::NullProgressSink;
use crate::runner;
use crate::status::CheckStatusCode;
use crate::ui::output::{self, Verbosity};

/// Dispatches a parsed [`Command`] to its handler.
pub fn dispatch(command: Command, repos: &[PathBuf], config: &EngineConfig, verbosity: Verbosity) -> Result<()> {
    match command {
        Command::Run { try_fix } => run(repos, config, try_fix, verbosity),
        Command::RunCheck { name, try_fix } => run_check(repos, config, &name, try_fix, verbosity),
        Command::List { json } => list(repos, config, json, verbosity),
        Command::Pathengine { action } => pathengine(action, config, verbosity),
        Command::Completions { shell } => completions(shell),
    }
}

fn build_engine(repos: &[PathBuf], config: &EngineConfig, verbosity: Verbosity) -> Result<Engine> {
    let mut engine = Engine::new(config.clone());
    let search_paths: Vec<&PathBuf> = if repos.is_empty() {
        config.repo_paths.iter().collect()
    } else {
        repos.iter().collect()
    };
    for repo in search_paths {
        match engine.load_repo(repo) {
            Ok(report) => {
                output::debug(
                    format!(
                        "loaded {} check(s), {} context(s) from {}",
                        report.check_ids.len(),
                        report.context_ids.len(),
                        repo.display()
                    ),
                    verbosity,
                );
                for (path, reason) in &report.skipped {
                    output::warn(format!("skipped {}: {reason}", path.display()), verbosity);
                }
            }
            Err(err) => output::warn(format!("failed to load repo {}: {err}", repo.display()), verbosity),
        }
    }
    Ok(engine)
}

fn run(repos: &[PathBuf], config: &EngineConfig, try_fix: bool, verbosity: Verbosity) -> Result<()> {
    let mut engine = build_engine(repos, config, verbosity)?;
    let mut progress = NullProgressSink;
    let mut any_failed = false;
    let repo_roots: Vec<PathBuf> = if repos.is_empty() {
        config.repo_paths.clone()
    } else {
        repos.to_vec()
    };
    for repo in repo_roots {
        let results = runner::run_checks_from_repo(&mut engine, &repo, try_fix, &mut progress);
        for (id, code) in results {
            let name = engine.checks().get(id).map(|c| c.name()).unwrap_or("<unknown>");
            print_check_result(name, code, verbosity);
            if !matches!(code, CheckStatusCode::Passed) {
                any_failed = true;
            }
        }
    }
    if any_failed {
        anyhow::bail!("one or more checks did not pass");
    }
    Ok(())
}

fn run_check(repos: &[PathBuf], config: &EngineConfig, name: &str, try_fix: bool, verbosity: Verbosity) -> Result<()> {
    let mut engine = build_engine(repos, config, verbosity)?;
    let code = runner::run_check(&mut engine, name, None, try_fix).with_context(|| format!("running check '{name}'"))?;
    print_check_result(name, code, verbosity);
    if !matches!(code, CheckStatusCode::Passed) {
        anyhow::bail!("check '{name}' did not pass");
    }
    Ok(())
}

fn list(repos: &[PathBuf], config: &EngineConfig, json: bool, verbosity: Verbosity) -> Result<()> {
    let engine = build_engine(repos, config, verbosity)?;
    let names: Vec<&str> = engine
        .checks()
        .iter()
        .map(|(_, check)| check.name())
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        output::print(output::format_list(&names, "- "), verbosity);
    }
    Ok(())
}

fn pathengine(action: PathEngineAction, config: &EngineConfig, verbosity: Verbosity) -> Result<()> {
    let repo = FolderStructure::discover(config).context("loading path template repo")?;
    match action {
        PathEngineAction::Parse { template, path, json } => {
            let fields = repo.parse(&template, &path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else {
                for (key, value) in &fields {
                    output::print(format!("{key}={value}"), verbosity);
                }
            }
        }
        PathEngineAction::Solve { template, fields } => {
            let mut data = HashMap::new();
            for field in fields {
                let (key, value) = field
                    .split_once('=')
                    .with_context(|| format!("'{field}' is not in key=value form"))?;
                data.insert(key.to_string(), value.to_string());
            }
            let path = repo.solve(&template, &data)?;
            output::print(path, verbosity);
        }
    }
    Ok(())
}

fn completions(shell: crate::cli::args::Shell) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as ClapShell};

    let clap_shell = match shell {
        crate::cli::args::Shell::Bash => ClapShell::Bash,
        crate::cli::args::Shell::Zsh => ClapShell::Zsh,
        crate::cli::args::Shell::Fish => ClapShell::Fish,
        crate::cli::args::Shell::PowerShell => ClapShell::PowerShell,
    };
    let mut cmd = crate::cli::args::Cli::command();
    let name = cmd.get_name().to_string();
    generate(clap_shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

fn print_check_result(name: &str, code: CheckStatusCode, verbosity: Verbosity) {
    let line = format!("{:<10} {name}", code.as_tag());
    match code {
        CheckStatusCode::Passed => output::success(line, verbosity),
        CheckStatusCode::Failed => output::error(line),
        _ => output::print(line, verbosity),
    }
}
