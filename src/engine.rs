//! engine
//!
//! The owner of both registries, loaded plugin libraries, and
//! configuration — and the only place that can see a `Check` and its
//! dependencies/shared context at the same time.
//!
//! # Architecture
//!
//! Per spec.md §9 "Registry global state", there is no process-wide
//! singleton: an `Engine` is a plain value a host constructs, loads repos
//! into, and drives. A `Check` only knows its dependencies and shared
//! context as ids (see [`crate::check::SharedContextRef`]); everything
//! that needs to resolve those ids against live instances — the
//! dependency-status gate, running dependencies first, handing a bound
//! context's shared state to a check's hooks — is a method here, not on
//! `Check` itself. This mirrors
//! `original_source/SanityChecker/sanitycheck.py`'s `SanityCheck` methods
//! (`run_full_check`, `run_check`, `validate_dependencies_status`,
//! `run_denpendencies`) field-for-field, just relocated to the object that
//! can actually see sibling instances.
//!
//! # Invariants
//!
//! - `run_full_check` never runs a dependency twice in the same call tree
//!   (the loader's cycle detection guarantees the dependency graph is a
//!   DAG, so plain recursion terminates).
//! - A check bound to a context that fails to reach `ready` is cancelled,
//!   never run.

use std::path::Path;

use libloading::Library;

use crate::check::{Check, SharedContextRef};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::loader::{self, LoadReport, RepoError};
use crate::registry::{CheckId, ContextId, Registry};
use crate::status::{CheckStatusCode, ContextStatusCode};

/// Owns every check/context loaded so far, plus the libraries they were
/// loaded from and the engine's configuration.
pub struct Engine {
    checks: Registry<Check>,
    contexts: Registry<Context>,
    libraries: Vec<Library>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            checks: Registry::new(),
            contexts: Registry::new(),
            libraries: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn checks(&self) -> &Registry<Check> {
        &self.checks
    }

    pub fn contexts(&self) -> &Registry<Context> {
        &self.contexts
    }

    pub fn checks_mut(&mut self) -> &mut Registry<Check> {
        &mut self.checks
    }

    pub fn contexts_mut(&mut self) -> &mut Registry<Context> {
        &mut self.contexts
    }

    /// Loads every check pack in `repo`, replacing any prior load for that
    /// same directory. Loaded libraries are retained by the engine for as
    /// long as it lives, since hooks resolved from them stay valid only
    /// while the library remains mapped.
    pub fn load_repo(&mut self, repo: &Path) -> Result<LoadReport, RepoError> {
        let mut report = loader::load_repo(&mut self.checks, &mut self.contexts, repo)?;
        self.libraries.append(&mut report.libraries);
        Ok(report)
    }

    pub fn check_by_name(&self, name: &str, repo: Option<&Path>) -> Option<CheckId> {
        self.checks.get_by_name(name, repo)
    }

    pub fn context_by_name(&self, name: &str, repo: Option<&Path>) -> Option<ContextId> {
        self.contexts.get_by_name(name, repo)
    }

    /// Ensures the context `id` has had its setup run, if it hasn't
    /// already settled into a terminal state.
    fn ensure_context_ready(&mut self, id: ContextId) {
        let needs_setup = matches!(
            self.contexts.get(id).map(|c| c.status().code()),
            Some(ContextStatusCode::NotReady)
        );
        if needs_setup {
            self.run_context_setup(id);
        }
    }

    /// Runs a context's setup directly, regardless of its current status.
    /// Exposed for [`crate::runner`], which drives context setup as its
    /// own phase ahead of any check that might bind to it.
    pub fn run_context_setup(&mut self, id: ContextId) {
        if let Some(context) = self.contexts.get_mut(id) {
            context.run_setup();
        }
    }

    /// Runs a context's teardown directly.
    pub fn run_context_teardown(&mut self, id: ContextId) {
        if let Some(context) = self.contexts.get_mut(id) {
            context.run_teardown();
        }
    }

    /// Runs every check bound to context `id`, in the order they were
    /// added, via `run_full_check`. A no-op unless the context already
    /// reached `ready`. After the last check, the context transitions to
    /// `finished` unless it's `failed` ([`Context::finish_after_running_checks`]).
    ///
    /// Mirrors `SharedContext.run_checks` in the source; relocated here,
    /// not onto `Context`, for the same reason `run_context_setup`/
    /// `run_context_teardown` already are — only `Engine` can see both
    /// registries at once.
    pub fn run_context_checks(&mut self, id: ContextId, try_fix: bool) {
        let Some(context) = self.contexts.get(id) else {
            return;
        };
        if !context.is_ready() {
            return;
        }
        let check_ids = context.checks().to_vec();
        for check_id in check_ids {
            self.run_full_check(check_id, try_fix, true);
        }
        if let Some(context) = self.contexts.get_mut(id) {
            context.finish_after_running_checks();
        }
    }

    /// `run_setup` -> `run_context_checks` -> `run_teardown` for context
    /// `id`. Mirrors `SharedContext.run_full_context` in the source.
    pub fn run_full_context(&mut self, id: ContextId, try_fix: bool) {
        self.run_context_setup(id);
        self.run_context_checks(id, try_fix);
        self.run_context_teardown(id);
    }

    /// Recursively runs a check's full lifecycle: dependencies first (if
    /// requested), the dependency-status gate, context setup, setup,
    /// check, an optional single fix-then-recheck, and teardown.
    ///
    /// Mirrors `SanityCheck.run_full_check` in the source.
    pub fn run_full_check(&mut self, id: CheckId, try_fix: bool, run_dependencies_first: bool) -> CheckStatusCode {
        if run_dependencies_first {
            let dependencies = self
                .checks
                .get(id)
                .map(|c| c.dependencies_instances().to_vec())
                .unwrap_or_default();
            for dependency in dependencies {
                self.run_full_check(dependency, try_fix, true);
            }
        }

        if !self.validate_dependencies_status(id) {
            if let Some(check) = self.checks.get_mut(id) {
                check.cancel_for_failed_dependencies();
            }
            return self
                .checks
                .get(id)
                .map(|c| c.status().code())
                .unwrap_or(CheckStatusCode::Cancelled);
        }

        self.run_check(id, try_fix);

        self.checks
            .get(id)
            .map(|c| c.status().code())
            .unwrap_or(CheckStatusCode::Failed)
    }

    /// Gated `_check` invocation: runs setup/check/teardown — and, if the
    /// check didn't pass and a fix is available, fix then a second
    /// setup/check/teardown pass — only if every dependency has already
    /// passed. Unlike `run_full_check`, this never recurses into
    /// dependencies — it only checks their already-recorded status.
    ///
    /// If this call is what brought a bound context out of `not_ready`
    /// (i.e. nothing upstream had started it yet), this call is also
    /// responsible for tearing that context back down once the check
    /// finishes — mirrors `context_ran_from_check` in the source.
    pub fn run_check(&mut self, id: CheckId, try_fix: bool) {
        if !self.validate_dependencies_status(id) {
            if let Some(check) = self.checks.get_mut(id) {
                check.cancel_for_failed_dependencies();
            }
            return;
        }

        let context_id = match self.checks.get(id).and_then(|c| c.shared_context()) {
            Some(SharedContextRef::Resolved(cid)) => Some(*cid),
            _ => None,
        };

        let mut context_started_here = false;
        if let Some(cid) = context_id {
            context_started_here = matches!(
                self.contexts.get(cid).map(|c| c.status().code()),
                Some(ContextStatusCode::NotReady)
            );
            self.ensure_context_ready(cid);

            let context_failed = matches!(
                self.contexts.get(cid).map(|c| c.status().code()),
                Some(ContextStatusCode::Failed) | Some(ContextStatusCode::Cancelled)
            );
            if context_failed {
                if let Some(check) = self.checks.get_mut(id) {
                    check.status_mut().set_code(CheckStatusCode::Cancelled);
                    check
                        .status_mut()
                        .add_message("shared context failed to reach ready".to_string());
                }
                if context_started_here {
                    self.run_context_teardown(cid);
                }
                return;
            }
        }

        self.run_setup(id);
        self.run_check_hook_only(id);
        self.run_teardown(id);

        if try_fix {
            let needs_fix = matches!(
                self.checks.get(id).map(|c| c.status().code()),
                Some(code) if code != CheckStatusCode::Passed
            );
            let has_fix = self.checks.get(id).map(|c| c.has_fix()).unwrap_or(false);
            if needs_fix && has_fix {
                self.run_fix(id);
                self.run_setup(id);
                self.run_check_hook_only(id);
                self.run_teardown(id);
            }
        }

        if context_started_here {
            if let Some(cid) = context_id {
                self.run_context_teardown(cid);
            }
        }
    }

    pub fn run_setup(&mut self, id: CheckId) {
        self.with_check_and_shared(id, |check, shared| check.run_setup(shared));
    }

    fn run_check_hook_only(&mut self, id: CheckId) {
        self.with_check_and_shared(id, |check, shared| check.run_check_hook(shared));
    }

    pub fn run_fix(&mut self, id: CheckId) {
        self.with_check_and_shared(id, |check, shared| check.run_fix(shared));
    }

    pub fn run_teardown(&mut self, id: CheckId) {
        self.with_check_and_shared(id, |check, shared| check.run_teardown(shared));
    }

    fn with_check_and_shared(&mut self, id: CheckId, f: impl FnOnce(&mut Check, &mut dyn std::any::Any)) {
        let context_id = match self.checks.get(id).and_then(|c| c.shared_context()) {
            Some(SharedContextRef::Resolved(cid)) => Some(*cid),
            _ => None,
        };
        let Some(check) = self.checks.get_mut(id) else {
            return;
        };
        match context_id.and_then(|cid| self.contexts.get_mut(cid)) {
            Some(context) => match context.shared_mut() {
                Some(shared) => f(check, shared),
                None => f(check, &mut ()),
            },
            None => f(check, &mut ()),
        }
    }

    /// True if every dependency of `id` has passed. A check with no
    /// dependencies always passes this gate.
    fn validate_dependencies_status(&self, id: CheckId) -> bool {
        let Some(check) = self.checks.get(id) else {
            return false;
        };
        check.dependencies_instances().iter().all(|&dep| {
            self.checks
                .get(dep)
                .map(|c| c.status().code() == CheckStatusCode::Passed)
                .unwrap_or(false)
        })
    }
}
