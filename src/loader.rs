//! loader
//!
//! Scans a repo directory for compiled check-pack dynamic libraries, loads
//! them, and binds the checks/contexts they register into an engine's
//! registries.
//!
//! # Architecture
//!
//! Grounded on `original_source/SanityChecker/checkrepo.py`'s
//! `load_sanitycheck_repo`: walk a directory, skip anything that looks
//! private (`__`-prefixed) or isn't a loadable module, import what's left,
//! and wire up contexts/dependencies after every module in the repo has
//! registered. The redesign (per spec.md §9) replaces "import a `.py`
//! file and introspect its classes" with "`dlopen` a `cdylib` and call its
//! fixed `sanitycheck_register` entry point" — see [`crate::plugin`].
//!
//! A load failure for one file (bad library, missing symbol) is logged and
//! skipped, not fatal, matching the source's per-file try/except loop. An
//! orphan shared-context reference or an unresolved dependency name is
//! likewise non-fatal — only the offending check is dropped (the former)
//! or the dangling dependency edge is skipped (the latter), matching
//! `checkrepo.py:51-55` and `checkrepo.py:98-100`. A dependency cycle *is*
//! fatal for the whole load: the source has no detection for this at all
//! and would simply hang, a gap spec.md §9 calls out as worth closing by
//! refusing the load instead.
//!
//! # Invariants
//!
//! - Only regular files are treated as check packs; subdirectories are not
//!   recursed into (the source's loader is single-level too).
//! - A file or directory whose name starts with `__` is skipped.
//! - Every `Library` successfully opened is kept alive for as long as the
//!   checks/contexts it registered are: symbols resolved from it remain
//!   valid only while the library stays mapped.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use libloading::Library;
use thiserror::Error;

use crate::check::{Check, SharedContextRef};
use crate::context::Context;
use crate::plugin::{Collector, RegisterFn, ENTRY_POINT_SYMBOL};
use crate::registry::{CheckId, Registry};

/// Errors that abort an entire repo load.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

/// What a successful repo load produced, plus anything skipped along the
/// way (surfaced to the caller instead of silently dropped).
pub struct LoadReport {
    pub repo: PathBuf,
    pub check_ids: Vec<CheckId>,
    pub context_ids: Vec<crate::registry::ContextId>,
    pub skipped: Vec<(PathBuf, String)>,
    /// Kept alive for as long as the loaded checks/contexts are: dropping
    /// a `Library` unmaps the code its hooks were resolved from.
    pub libraries: Vec<Library>,
}

fn native_dylib_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

fn is_private(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with("__")
}

fn candidate_files(repo: &Path) -> std::io::Result<Vec<PathBuf>> {
    let ext = native_dylib_extension();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(repo)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();
        if is_private(&file_name) {
            continue;
        }
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(OsStr::to_str) != Some(ext) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Loads every check pack in `repo`, binds contexts and dependencies, and
/// registers the result into `checks`/`contexts`. Replaces any prior load
/// for this repo, matching the source's "reloading a repo replaces its
/// previous registrations" behavior (see [`Registry::extend`]).
pub fn load_repo(
    checks: &mut Registry<Check>,
    contexts: &mut Registry<Context>,
    repo: &Path,
) -> Result<LoadReport, RepoError> {
    if !repo.is_dir() {
        return Err(RepoError::NotADirectory(repo.to_path_buf()));
    }

    let files = candidate_files(repo).unwrap_or_default();
    let mut skipped = Vec::new();
    let mut libraries = Vec::new();
    let mut all_contexts = Vec::new();
    let mut all_checks = Vec::new();
    let mut context_modules = Vec::new();
    let mut check_modules = Vec::new();

    for path in files {
        let module = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let library = match unsafe { Library::new(&path) } {
            Ok(lib) => lib,
            Err(err) => {
                skipped.push((path.clone(), format!("failed to load library: {err}")));
                continue;
            }
        };

        let entry: RegisterFn = match unsafe { library.get::<RegisterFn>(ENTRY_POINT_SYMBOL) } {
            Ok(symbol) => *symbol,
            Err(err) => {
                skipped.push((path.clone(), format!("missing {} symbol: {err}", String::from_utf8_lossy(ENTRY_POINT_SYMBOL))));
                continue;
            }
        };

        let mut collector = Collector::new();
        unsafe { entry(&mut collector) };

        for context in collector.contexts {
            context_modules.push(module.clone());
            all_contexts.push(context);
        }
        for check in collector.checks {
            check_modules.push(module.clone());
            all_checks.push(check);
        }
        libraries.push(library);
    }

    // Register contexts first (checks may reference them by name).
    let mut context_ids_by_module: HashMap<String, Vec<crate::registry::ContextId>> = HashMap::new();
    for (context, module) in all_contexts.into_iter().zip(context_modules) {
        let ids = contexts.extend(repo.to_path_buf(), module.clone(), vec![context]);
        context_ids_by_module.entry(module).or_default().extend(ids);
    }
    let context_ids = contexts.ids_by_repo(repo);

    let mut name_to_context: HashMap<String, crate::registry::ContextId> = HashMap::new();
    for &id in &context_ids {
        if let Some(context) = contexts.get(id) {
            name_to_context.insert(context.name().to_string(), id);
        }
    }

    let mut check_ids = Vec::new();
    for (check, module) in all_checks.into_iter().zip(check_modules) {
        let ids = checks.extend(repo.to_path_buf(), module, vec![check]);
        check_ids.extend(ids);
    }

    bind_shared_contexts(checks, contexts, &mut check_ids, &name_to_context, repo, &mut skipped);
    bind_dependencies(checks, &check_ids)?;

    detect_cycles(checks, &check_ids)?;

    Ok(LoadReport {
        repo: repo.to_path_buf(),
        check_ids,
        context_ids,
        skipped,
        libraries,
    })
}

/// Resolves every check's shared-context name against `name_to_context`,
/// binding the match and registering the check as a context member.
///
/// A name with no match is an orphan: `checkrepo.py:51-55` drops just that
/// check (removed from both `checks` and `check_ids`) and continues,
/// rather than failing the whole load over one bad reference.
fn bind_shared_contexts(
    checks: &mut Registry<Check>,
    contexts: &mut Registry<Context>,
    check_ids: &mut Vec<CheckId>,
    name_to_context: &HashMap<String, crate::registry::ContextId>,
    repo: &Path,
    skipped: &mut Vec<(PathBuf, String)>,
) {
    let mut orphaned: Vec<CheckId> = Vec::new();
    for &id in check_ids.iter() {
        let (check_name, unresolved) = {
            let check = checks.get(id).expect("just inserted");
            match check.shared_context() {
                Some(SharedContextRef::Unresolved(name)) => (check.name().to_string(), Some(name.clone())),
                _ => (check.name().to_string(), None),
            }
        };
        let Some(context_name) = unresolved else {
            continue;
        };
        match name_to_context.get(&context_name) {
            Some(&context_id) => {
                let check = checks.get_mut(id).expect("just inserted");
                check.resolve_shared_context(context_id);
                let context = contexts.get_mut(context_id).expect("resolved above");
                if context.add_check(id).is_err() {
                    orphaned.push(id);
                    skipped.push((
                        repo.to_path_buf(),
                        format!("check '{check_name}' references unknown shared context '{context_name}'"),
                    ));
                }
            }
            None => {
                orphaned.push(id);
                skipped.push((
                    repo.to_path_buf(),
                    format!("check '{check_name}' references unknown shared context '{context_name}'"),
                ));
            }
        }
    }
    for &id in &orphaned {
        checks.remove(id, repo);
    }
    check_ids.retain(|id| !orphaned.contains(id));
}

/// Resolves every check's dependency names against its siblings. A name
/// with no match is silently skipped (`checkrepo.py:98-100`) rather than
/// failing the load: the check just runs without that dependency gating
/// it. Only a resulting dependency cycle is fatal.
fn bind_dependencies(checks: &mut Registry<Check>, check_ids: &[CheckId]) -> Result<(), RepoError> {
    let mut name_to_check: HashMap<String, CheckId> = HashMap::new();
    for &id in check_ids {
        if let Some(check) = checks.get(id) {
            name_to_check.insert(check.name().to_string(), id);
        }
    }
    for &id in check_ids {
        let (check_name, dependency_names) = {
            let check = checks.get(id).expect("just inserted");
            (check.name().to_string(), check.dependencies_names().to_vec())
        };
        for dependency_name in dependency_names {
            let Some(dependency_id) = name_to_check.get(&dependency_name).copied() else {
                continue;
            };
            let check = checks.get_mut(id).expect("just inserted");
            check
                .add_dependency(dependency_id, id)
                .map_err(|_| RepoError::DependencyCycle(vec![check_name.clone()]))?;
        }
    }
    Ok(())
}

/// Depth-first cycle detection over the resolved dependency graph.
///
/// The source has no equivalent check at all: a cyclic dependency set
/// would simply infinite-loop `run_full_check`'s recursive
/// `run_dependencies`. spec.md §9 names this as an open question this
/// crate resolves in favor of detecting it at load time and refusing the
/// load, rather than reproducing the hang.
fn detect_cycles(checks: &Registry<Check>, ids: &[CheckId]) -> Result<(), RepoError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<CheckId, Mark> = HashMap::new();
    let mut stack: Vec<CheckId> = Vec::new();

    fn visit(
        id: CheckId,
        checks: &Registry<Check>,
        marks: &mut HashMap<CheckId, Mark>,
        stack: &mut Vec<CheckId>,
    ) -> Result<(), RepoError> {
        match marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|&x| x == id).unwrap_or(0);
                let mut names: Vec<String> = stack[start..]
                    .iter()
                    .filter_map(|&i| checks.get(i).map(|c| c.name().to_string()))
                    .collect();
                if let Some(check) = checks.get(id) {
                    names.push(check.name().to_string());
                }
                return Err(RepoError::DependencyCycle(names));
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        if let Some(check) = checks.get(id) {
            for &dep in check.dependencies_instances() {
                visit(dep, checks, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for &id in ids {
        visit(id, checks, &mut marks, &mut stack)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_repo_is_rejected() {
        let mut checks = Registry::new();
        let mut contexts = Registry::new();
        let result = load_repo(&mut checks, &mut contexts, Path::new("/no/such/repo/path"));
        assert!(matches!(result, Err(RepoError::NotADirectory(_))));
    }

    #[test]
    fn empty_directory_loads_with_nothing_registered() {
        let dir = tempfile::tempdir().unwrap();
        let mut checks = Registry::new();
        let mut contexts = Registry::new();
        let report = load_repo(&mut checks, &mut contexts, dir.path()).unwrap();
        assert!(report.check_ids.is_empty());
        assert!(report.context_ids.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn non_library_files_are_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"not a library").unwrap();
        std::fs::write(dir.path().join("__private.so"), b"skip me").unwrap();
        let mut checks = Registry::new();
        let mut contexts = Registry::new();
        let report = load_repo(&mut checks, &mut contexts, dir.path()).unwrap();
        assert!(report.check_ids.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn detect_cycles_flags_self_dependency_path() {
        use crate::check::CheckBuilder;

        let mut checks: Registry<Check> = Registry::new();
        let a = CheckBuilder::new()
            .name("A")
            .check(|_| Ok(crate::check::CheckOutcome::Passed))
            .build("A")
            .unwrap();
        let ids = checks.extend(PathBuf::from("/repo"), "m", vec![a]);
        let a_id = ids[0];
        // A depends on itself via a manufactured edge (bypassing
        // add_dependency's self-check to exercise the cycle detector on a
        // 2-node cycle instead).
        let b = CheckBuilder::new()
            .name("B")
            .check(|_| Ok(crate::check::CheckOutcome::Passed))
            .build("B")
            .unwrap();
        let b_ids = checks.extend(PathBuf::from("/repo"), "m", vec![b]);
        let b_id = b_ids[0];
        checks.get_mut(a_id).unwrap().add_dependency(b_id, a_id).unwrap();
        checks.get_mut(b_id).unwrap().add_dependency(a_id, b_id).unwrap();

        let result = detect_cycles(&checks, &[a_id, b_id]);
        assert!(matches!(result, Err(RepoError::DependencyCycle(_))));
    }

    #[test]
    fn orphan_shared_context_is_dropped_and_siblings_survive() {
        use crate::check::CheckBuilder;

        let mut checks: Registry<Check> = Registry::new();
        let mut contexts: Registry<Context> = Registry::new();
        let repo = PathBuf::from("/repo");

        let orphan = CheckBuilder::new()
            .name("Orphan")
            .check(|_| Ok(crate::check::CheckOutcome::Passed))
            .shared_context("NoSuchContext")
            .build("Orphan")
            .unwrap();
        let sibling = CheckBuilder::new()
            .name("Sibling")
            .check(|_| Ok(crate::check::CheckOutcome::Passed))
            .build("Sibling")
            .unwrap();
        let orphan_ids = checks.extend(repo.clone(), "m", vec![orphan]);
        let sibling_ids = checks.extend(repo.clone(), "m", vec![sibling]);
        let mut check_ids: Vec<CheckId> = orphan_ids.iter().chain(&sibling_ids).copied().collect();

        let mut skipped = Vec::new();
        bind_shared_contexts(&mut checks, &mut contexts, &mut check_ids, &HashMap::new(), &repo, &mut skipped);

        assert!(!check_ids.contains(&orphan_ids[0]));
        assert!(checks.get(orphan_ids[0]).is_none());
        assert!(check_ids.contains(&sibling_ids[0]));
        assert!(checks.get(sibling_ids[0]).is_some());
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn unresolved_dependency_name_is_skipped_not_fatal() {
        use crate::check::CheckBuilder;

        let mut checks: Registry<Check> = Registry::new();
        let repo = PathBuf::from("/repo");
        let dependent = CheckBuilder::new()
            .name("Dependent")
            .check(|_| Ok(crate::check::CheckOutcome::Passed))
            .dependencies(["GhostDependency"])
            .build("Dependent")
            .unwrap();
        let ids = checks.extend(repo, "m", vec![dependent]);

        let result = bind_dependencies(&mut checks, &ids);
        assert!(result.is_ok());
        assert!(checks.get(ids[0]).unwrap().dependencies_instances().is_empty());
    }
}
