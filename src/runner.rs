//! runner
//!
//! Drives a batch of checks to completion in three phases — contexts
//! (each run through its full setup/member-checks/teardown cycle), then
//! dependency-free standalone checks, then dependent standalone checks —
//! reporting progress once per phase.
//!
//! # Architecture
//!
//! Grounded on `original_source/SanityChecker/run.py`'s
//! `run_checks_from_repo`/`run_checks`/`run_check` trio. The source treats
//! "checks with dependencies" and "checks without" as two buckets rather
//! than doing a full topological sort, which only works because a
//! dependent check is only ever allowed to depend on independent ones —
//! this crate keeps that same flat, two-tier model rather than
//! introducing a general scheduler the source never had.
//!
//! A context's member checks are run *by the context* in phase one
//! (`Engine::run_full_context`, in insertion order) and are then excluded
//! from phases two and three via a skip set — `run.py:49-52`'s
//! `checks_runned_by_contexts` — so contexts run strictly before
//! standalone checks and a member check never runs twice.
//!
//! Progress is reset once per phase (`ProgressSink::reset` +
//! `set_maximum`), then advanced by one unit (`add_progress(1)`) per
//! completed check/context within that phase, exactly mirroring the
//! source's per-phase progress bar resets.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use crate::engine::Engine;
use crate::progress::ProgressSink;
use crate::registry::{CheckId, ContextId};
use crate::status::CheckStatusCode;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no check named '{0}' is registered")]
    UnknownCheck(String),
}

/// The outcome of running a batch of checks: each check's final status
/// code, in the order they were run.
pub type RunResults = Vec<(CheckId, CheckStatusCode)>;

/// Runs every check loaded from `repo`.
pub fn run_checks_from_repo(
    engine: &mut Engine,
    repo: &Path,
    try_fix: bool,
    progress: &mut dyn ProgressSink,
) -> RunResults {
    let check_ids = engine.checks().ids_by_repo(repo);
    let context_ids = engine.contexts().ids_by_repo(repo);
    run_checks(engine, &check_ids, &context_ids, try_fix, progress)
}

/// Runs exactly the given checks and contexts, three phases in order.
pub fn run_checks(
    engine: &mut Engine,
    checks: &[CheckId],
    contexts: &[ContextId],
    try_fix: bool,
    progress: &mut dyn ProgressSink,
) -> RunResults {
    let mut checks_runned_by_contexts: HashSet<CheckId> = HashSet::new();

    progress.reset();
    progress.set_maximum(contexts.len() as u64);
    for &context_id in contexts {
        if let Some(context) = engine.contexts().get(context_id) {
            checks_runned_by_contexts.extend(context.checks().iter().copied());
        }
        engine.run_full_context(context_id, try_fix);
        progress.add_progress(1);
    }

    let (with_deps, without_deps): (Vec<CheckId>, Vec<CheckId>) = checks
        .iter()
        .copied()
        .filter(|id| !checks_runned_by_contexts.contains(id))
        .partition(|&id| engine.checks().get(id).map(|c| c.has_dependencies()).unwrap_or(false));

    let mut results = Vec::with_capacity(checks.len());

    progress.reset();
    progress.set_maximum(without_deps.len() as u64);
    for id in without_deps {
        engine.run_check(id, try_fix);
        let code = engine.checks().get(id).map(|c| c.status().code()).unwrap_or(CheckStatusCode::Failed);
        results.push((id, code));
        progress.add_progress(1);
    }

    progress.reset();
    progress.set_maximum(with_deps.len() as u64);
    for id in with_deps {
        engine.run_check(id, try_fix);
        let code = engine.checks().get(id).map(|c| c.status().code()).unwrap_or(CheckStatusCode::Failed);
        results.push((id, code));
        progress.add_progress(1);
    }

    results
}

/// Runs a single named check (and its dependencies, recursively) by name,
/// optionally scoped to one repo.
pub fn run_check(
    engine: &mut Engine,
    name: &str,
    repo: Option<&Path>,
    try_fix: bool,
) -> Result<CheckStatusCode, RunError> {
    let id = engine
        .check_by_name(name, repo)
        .ok_or_else(|| RunError::UnknownCheck(name.to_string()))?;
    Ok(engine.run_full_check(id, try_fix, true))
}
