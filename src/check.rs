//! check
//!
//! `Check` — a single validation unit with optional setup/fix/teardown.
//!
//! # Architecture
//!
//! A `Check` is built, not subclassed: authors use [`CheckBuilder`] to supply
//! closures for `_setup`/`_check`/`_fix`/`_teardown` instead of overriding
//! methods on a base class (see spec.md §9 "Hook-presence introspection" —
//! comparing unbound methods across a subclass and its base has no safe
//! analogue against a Rust trait object, so hook presence is simply recorded
//! at build time). Only `_check` is mandatory.
//!
//! This type owns its hooks and status but *not* its dependencies or its
//! shared context: those are [`crate::registry::CheckId`]/
//! [`crate::registry::ContextId`] references resolved against the
//! registries an [`crate::engine::Engine`] owns. Orchestration that needs to
//! see sibling checks (the dependency-status gate, running dependencies
//! first, binding a context's shared state) lives in [`crate::engine`], not
//! here — a `Check` alone cannot answer "have my dependencies passed?".
//!
//! # Invariants
//!
//! - `name` is at most 50 characters, `description` at most 140.
//! - `priority` is in `[0, 100]`.
//! - A hook that panics or returns `Err` never propagates past the guarded
//!   runner methods below: it becomes `status.code = Failed` plus a message.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::registry::{CheckId, ContextId, Named};
use crate::status::{CheckStatus, CheckStatusCode, ImplementationError};

const NAME_CHAR_LIMIT: usize = 50;
const DESCRIPTION_CHAR_LIMIT: usize = 140;
const PRIORITY_MIN: i32 = 0;
const PRIORITY_MAX: i32 = 100;

/// Errors raised by `Check` setters and dependency wiring.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Implementation(#[from] ImplementationError),

    #[error("a check cannot depend on itself: {0}")]
    SelfDependency(String),
}

/// The deliberate terminal outcome a `_check` hook reports.
///
/// This is distinct from a hook *erroring*: `Err` always becomes `Failed`.
/// `CheckOutcome` is how an author's check logic reports that it ran to
/// completion and observed the system to be in (or out of) the desired
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    NotPassed(String),
}

type SetupHook = Box<dyn FnMut(&mut dyn Any) -> anyhow::Result<()> + Send>;
type CheckHook = Box<dyn FnMut(&mut dyn Any) -> anyhow::Result<CheckOutcome> + Send>;
type FixHook = Box<dyn FnMut(&mut dyn Any) -> anyhow::Result<()> + Send>;
type TeardownHook = Box<dyn FnMut(&mut dyn Any) -> anyhow::Result<()> + Send>;

/// How a `Check`'s shared context is referenced.
///
/// Unresolved until the loader finds a matching `Context` by name; resolved
/// thereafter. Modeled as the tagged variant spec.md §9 prescribes rather
/// than a runtime-polymorphic field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedContextRef {
    Unresolved(String),
    Resolved(ContextId),
}

/// A single validation unit.
pub struct Check {
    name: String,
    description: String,
    priority: i32,
    status: CheckStatus,
    dependencies_names: Vec<String>,
    dependencies_instances: Vec<CheckId>,
    shared_context: Option<SharedContextRef>,
    actions: Vec<crate::action::Action>,

    setup: Option<SetupHook>,
    check: CheckHook,
    fix: Option<FixHook>,
    teardown: Option<TeardownHook>,
}

impl Check {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn status(&self) -> &CheckStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut CheckStatus {
        &mut self.status
    }

    pub fn dependencies_names(&self) -> &[String] {
        &self.dependencies_names
    }

    pub fn dependencies_instances(&self) -> &[CheckId] {
        &self.dependencies_instances
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies_instances.is_empty() || !self.dependencies_names.is_empty()
    }

    pub fn shared_context(&self) -> Option<&SharedContextRef> {
        self.shared_context.as_ref()
    }

    pub fn resolve_shared_context(&mut self, context: ContextId) {
        self.shared_context = Some(SharedContextRef::Resolved(context));
    }

    pub fn actions(&self) -> &[crate::action::Action] {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut [crate::action::Action] {
        &mut self.actions
    }

    /// Adds a resolved dependency. The loader calls this once per name hit;
    /// a check that names itself is rejected (cycles of length 1 are the
    /// easiest ones to catch early).
    pub fn add_dependency(&mut self, dependency: CheckId, self_id: CheckId) -> Result<(), CheckError> {
        if dependency == self_id {
            return Err(CheckError::SelfDependency(self.name.clone()));
        }
        if !self.dependencies_instances.contains(&dependency) {
            self.dependencies_instances.push(dependency);
        }
        Ok(())
    }

    pub fn has_setup(&self) -> bool {
        self.setup.is_some()
    }

    pub fn has_fix(&self) -> bool {
        self.fix.is_some()
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    /// `_check` is mandatory, so this is always true for a built `Check`.
    pub fn has_check(&self) -> bool {
        true
    }

    fn guard<F>(&mut self, phase: &str, mut body: F)
    where
        F: FnMut(&mut Self) -> anyhow::Result<()>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(|| body(self)));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let name = self.name.clone();
                self.status.set_code(CheckStatusCode::Failed);
                self.status
                    .add_message(format!("unhandled exception raised running {name}.{phase}(): {err}"));
            }
            Err(panic) => {
                let name = self.name.clone();
                let message = crate::action::panic_message(panic);
                self.status.set_code(CheckStatusCode::Failed);
                self.status
                    .add_message(format!("unhandled exception raised running {name}.{phase}(): {message}"));
            }
        }
    }

    /// Runs `_setup` under the exception guard. A check with no setup hook
    /// is a no-op here, matching the source's default `_setup`.
    pub fn run_setup(&mut self, shared: &mut dyn Any) {
        if self.setup.is_none() {
            return;
        }
        self.guard("setup", |this| {
            let hook = this.setup.as_mut().expect("checked above");
            hook(shared)
        });
    }

    /// Runs `_check` under the exception guard. Unlike `run_setup`, this
    /// does **not** perform the dependency-status gate: that requires
    /// seeing sibling checks' statuses, which only `Engine::run_check` can
    /// do. Calling this directly (bypassing the gate) mirrors the source's
    /// own layering — `run_check` is the gated entry point, `_check` itself
    /// is not.
    pub fn run_check_hook(&mut self, shared: &mut dyn Any) {
        self.guard("check", |this| {
            let outcome = (this.check)(shared)?;
            match outcome {
                CheckOutcome::Passed => this.status.set_code(CheckStatusCode::Passed),
                CheckOutcome::NotPassed(message) => {
                    this.status.set_code(CheckStatusCode::NotPassed);
                    this.status.add_message(message);
                }
            }
            Ok(())
        });
    }

    /// Runs `_fix` under the exception guard, if present.
    pub fn run_fix(&mut self, shared: &mut dyn Any) {
        if self.fix.is_none() {
            return;
        }
        self.guard("fix", |this| {
            let hook = this.fix.as_mut().expect("checked above");
            hook(shared)
        });
    }

    /// Runs `_teardown` under the exception guard, if present.
    pub fn run_teardown(&mut self, shared: &mut dyn Any) {
        if self.teardown.is_none() {
            return;
        }
        self.guard("teardown", |this| {
            let hook = this.teardown.as_mut().expect("checked above");
            hook(shared)
        });
    }

    /// Sets this check to `cancelled` with the standard dependencies-failed
    /// message, without invoking any hook.
    pub fn cancel_for_failed_dependencies(&mut self) {
        self.status.set_code(CheckStatusCode::Cancelled);
        self.status
            .add_message(format!("Dependencies for {} failed or haven't passed.", self.name));
    }
}

impl Named for Check {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Builds a [`Check]`, validating lengths/bounds at `build()`.
///
/// # Example
///
/// ```
/// use sanitycheck::check::{CheckBuilder, CheckOutcome};
///
/// let check = CheckBuilder::new()
///     .name("FileExists")
///     .description("Verifies a required file is present")
///     .check(|_ctx| Ok(CheckOutcome::Passed))
///     .build("FileExists")
///     .unwrap();
/// assert_eq!(check.name(), "FileExists");
/// assert!(check.has_check());
/// assert!(!check.has_fix());
/// ```
pub struct CheckBuilder {
    name: Option<String>,
    description: String,
    priority: i32,
    dependencies_names: Vec<String>,
    shared_context: Option<String>,
    actions: Vec<crate::action::Action>,
    setup: Option<SetupHook>,
    check: Option<CheckHook>,
    fix: Option<FixHook>,
    teardown: Option<TeardownHook>,
}

impl CheckBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            description: String::new(),
            priority: 0,
            dependencies_names: Vec::new(),
            shared_context: None,
            actions: Vec::new(),
            setup: None,
            check: None,
            fix: None,
            teardown: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn dependencies(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn shared_context(mut self, name: impl Into<String>) -> Self {
        self.shared_context = Some(name.into());
        self
    }

    pub fn register_actions(mut self, actions: Vec<crate::action::Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn Any) -> anyhow::Result<()> + Send + 'static,
    {
        self.setup = Some(Box::new(hook));
        self
    }

    pub fn check<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn Any) -> anyhow::Result<CheckOutcome> + Send + 'static,
    {
        self.check = Some(Box::new(hook));
        self
    }

    pub fn fix<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn Any) -> anyhow::Result<()> + Send + 'static,
    {
        self.fix = Some(Box::new(hook));
        self
    }

    pub fn teardown<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn Any) -> anyhow::Result<()> + Send + 'static,
    {
        self.teardown = Some(Box::new(hook));
        self
    }

    /// Validates bounds and the mandatory `_check` hook, producing a
    /// `Check`. `default_name` is used when the author never called
    /// `.name(...)`, matching the source's "defaults to class name" rule.
    pub fn build(self, default_name: &str) -> Result<Check, ImplementationError> {
        let name = self.name.unwrap_or_else(|| default_name.to_string());
        if name.chars().count() > NAME_CHAR_LIMIT {
            return Err(ImplementationError::NameTooLong {
                limit: NAME_CHAR_LIMIT,
                len: name.chars().count(),
            });
        }
        if self.description.chars().count() > DESCRIPTION_CHAR_LIMIT {
            return Err(ImplementationError::DescriptionTooLong {
                limit: DESCRIPTION_CHAR_LIMIT,
                len: self.description.chars().count(),
            });
        }
        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&self.priority) {
            return Err(ImplementationError::PriorityOutOfRange {
                min: PRIORITY_MIN,
                max: PRIORITY_MAX,
                value: self.priority,
            });
        }
        let check = self.check.ok_or(ImplementationError::MissingRequiredHook {
            builder: "CheckBuilder",
            hook: "check",
        })?;

        Ok(Check {
            name,
            description: self.description,
            priority: self.priority,
            status: CheckStatus::new(CheckStatusCode::NotRan),
            dependencies_names: self.dependencies_names,
            dependencies_instances: Vec::new(),
            shared_context: self.shared_context.map(SharedContextRef::Unresolved),
            actions: self.actions,
            setup: self.setup,
            check,
            fix: self.fix,
            teardown: self.teardown,
        })
    }
}

impl Default for CheckBuilder {
    fn default() -> Self {
        Self::new()
    }
}
