//! context
//!
//! `Context` — shared setup/teardown state a group of `Check`s can bind to.
//!
//! # Architecture
//!
//! A `Context` owns no `Check`s directly: the member list (`checks`, a list
//! of [`crate::registry::CheckId`]) only records which checks are bound to
//! it for ordering and display purposes. Orchestrating "run every check
//! bound to this context" (the source's `run_checks`/`run_full_context`)
//! lives in [`crate::engine::Engine::run_context_checks`]/
//! [`crate::engine::Engine::run_full_context`], the only place that can see
//! both registries; `finish_after_running_checks` below is the one piece of
//! that operation that mutates only this context's own state.
//!
//! What a `Context` *does* own is the shared mutable state itself
//! (`shared: Box<dyn Any + Send>`), handed to every hook — its own
//! setup/teardown and every bound check's setup/check/fix/teardown — as
//! `&mut dyn Any`. Authors downcast it to whatever concrete type their
//! `_setup` populated.
//!
//! # Invariants
//!
//! - `name`/`description` obey the same length limits as `Check`.
//! - A `Context` only transitions to `finished` if its setup previously
//!   reached `ready` (see spec.md §9 "Context lifecycle transition bug" —
//!   the source lets `finished` be reached even from `not_ready`/`failed`;
//!   this crate fixes that).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::registry::{CheckId, Named};
use crate::status::{ContextStatus, ContextStatusCode, ImplementationError};

const NAME_CHAR_LIMIT: usize = 50;
const DESCRIPTION_CHAR_LIMIT: usize = 140;

type SetupHook = Box<dyn FnMut() -> anyhow::Result<Box<dyn Any + Send>> + Send>;
type TeardownHook = Box<dyn FnMut(&mut dyn Any) -> anyhow::Result<()> + Send>;

/// Shared setup/teardown state for a group of checks.
pub struct Context {
    name: String,
    description: String,
    status: ContextStatus,
    checks: Vec<CheckId>,
    shared: Option<Box<dyn Any + Send>>,
    setup: Option<SetupHook>,
    teardown: Option<TeardownHook>,
    ever_reached_ready: bool,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> &ContextStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut ContextStatus {
        &mut self.status
    }

    pub fn checks(&self) -> &[CheckId] {
        &self.checks
    }

    pub fn has_setup(&self) -> bool {
        self.setup.is_some()
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.status.code() == ContextStatusCode::Ready
    }

    pub fn has_finished(&self) -> bool {
        self.status.code() == ContextStatusCode::Finished
    }

    /// Binds a check to this context. Rejects a duplicate id, matching the
    /// source's "a check can only be registered with a context once".
    pub fn add_check(&mut self, id: CheckId) -> Result<(), ImplementationError> {
        if self.checks.contains(&id) {
            return Err(ImplementationError::Duplicate(format!(
                "check is already registered with context {}",
                self.name
            )));
        }
        self.checks.push(id);
        Ok(())
    }

    /// Gives hooks mutable access to the shared state populated by
    /// `run_setup`. `None` until setup has run at least once successfully.
    pub fn shared_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.shared.as_deref_mut()
    }

    fn guard_teardown(&mut self) {
        let Some(mut hook) = self.teardown.take() else {
            return;
        };
        let shared = &mut self.shared;
        let result = panic::catch_unwind(AssertUnwindSafe(|| match shared {
            Some(state) => hook(state.as_mut()),
            None => hook(&mut ()),
        }));
        self.teardown = Some(hook);
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let name = self.name.clone();
                self.status.set_code(ContextStatusCode::Failed);
                self.status
                    .add_message(format!("unhandled exception raised running {name} teardown(): {err}"));
            }
            Err(panic) => {
                let name = self.name.clone();
                let message = crate::action::panic_message(panic);
                self.status.set_code(ContextStatusCode::Failed);
                self.status
                    .add_message(format!("unhandled exception raised running {name} teardown(): {message}"));
            }
        }
    }

    /// Runs setup if present, populating `shared` and transitioning to
    /// `ready` on success or `failed` on error/panic. A context without a
    /// setup hook goes straight to `ready` (nothing to wait on).
    pub fn run_setup(&mut self) {
        let Some(mut hook) = self.setup.take() else {
            self.status.set_code(ContextStatusCode::Ready);
            self.ever_reached_ready = true;
            return;
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| hook()));
        self.setup = Some(hook);
        match result {
            Ok(Ok(state)) => {
                self.shared = Some(state);
                self.status.set_code(ContextStatusCode::Ready);
                self.ever_reached_ready = true;
            }
            Ok(Err(err)) => {
                let name = self.name.clone();
                self.status.set_code(ContextStatusCode::Failed);
                self.status
                    .add_message(format!("unhandled exception raised running {name} setup(): {err}"));
            }
            Err(panic) => {
                let name = self.name.clone();
                let message = crate::action::panic_message(panic);
                self.status.set_code(ContextStatusCode::Failed);
                self.status
                    .add_message(format!("unhandled exception raised running {name} setup(): {message}"));
            }
        }
    }

    /// Runs teardown (if present) and, only if setup ever reached `ready`,
    /// transitions to `finished`. A context whose setup never succeeded
    /// stays in whatever failed/cancelled state it already carries —
    /// fixing the source's bug where `finished` was reachable regardless.
    ///
    /// A no-op if already `finished`: calling this twice in sequence runs
    /// `_teardown` at most once, guarding against a check's teardown and
    /// the context's own teardown both firing for the same context.
    pub fn run_teardown(&mut self) {
        if self.status.code() == ContextStatusCode::Finished {
            return;
        }
        self.guard_teardown();
        if self.ever_reached_ready && self.status.code() != ContextStatusCode::Failed {
            self.status.set_code(ContextStatusCode::Finished);
        }
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.status.set_code(ContextStatusCode::Cancelled);
        self.status.add_message(reason.into());
    }

    /// The final step of `run_checks`: transitions to `finished` unless
    /// this context's own setup/teardown already marked it `failed`. A
    /// context never fails because one of its member checks failed — only
    /// its own hooks can do that.
    ///
    /// Exposed so [`crate::engine::Engine`] can call it after driving every
    /// member check through `run_full_check` — a `Context` owns no `Check`
    /// instances (see module docs), so it cannot run them itself.
    pub fn finish_after_running_checks(&mut self) {
        if self.status.code() != ContextStatusCode::Failed {
            self.status.set_code(ContextStatusCode::Finished);
        }
    }
}

impl Named for Context {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Builds a [`Context`], validating lengths at `build()`.
pub struct ContextBuilder {
    name: Option<String>,
    description: String,
    setup: Option<SetupHook>,
    teardown: Option<TeardownHook>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            description: String::new(),
            setup: None,
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

    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> anyhow::Result<Box<dyn Any + Send>> + Send + 'static,
    {
        self.setup = Some(Box::new(hook));
        self
    }

    pub fn teardown<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn Any) -> anyhow::Result<()> + Send + 'static,
    {
        self.teardown = Some(Box::new(hook));
        self
    }

    pub fn build(self, default_name: &str) -> Result<Context, ImplementationError> {
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
        Ok(Context {
            name,
            description: self.description,
            status: ContextStatus::new(),
            checks: Vec::new(),
            shared: None,
            setup: self.setup,
            teardown: self.teardown,
            ever_reached_ready: false,
        })
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_id(n: usize) -> CheckId {
        // RegistryId has no public constructor; go through a real Registry
        // to mint ids the way production code does.
        let mut reg: crate::registry::Registry<()> = crate::registry::Registry::new();
        let ids = reg.extend(std::path::PathBuf::from("/repo"), "m", vec![(); n + 1]);
        ids[n]
    }

    #[test]
    fn context_without_setup_goes_straight_to_ready() {
        let mut ctx = ContextBuilder::new().name("NoSetup").build("NoSetup").unwrap();
        ctx.run_setup();
        assert_eq!(ctx.status().code(), ContextStatusCode::Ready);
        assert!(ctx.is_ready());
    }

    #[test]
    fn setup_populates_shared_state_and_reaches_ready() {
        let mut ctx = ContextBuilder::new()
            .name("WithSetup")
            .setup(|| Ok(Box::new(42i32) as Box<dyn Any + Send>))
            .build("WithSetup")
            .unwrap();
        ctx.run_setup();
        assert!(ctx.is_ready());
        let shared = ctx.shared_mut().unwrap();
        assert_eq!(*shared.downcast_ref::<i32>().unwrap(), 42);
    }

    #[test]
    fn setup_error_sets_failed_without_propagating() {
        let mut ctx = ContextBuilder::new()
            .name("Failing")
            .setup(|| anyhow::bail!("cannot acquire resource"))
            .build("Failing")
            .unwrap();
        ctx.run_setup();
        assert_eq!(ctx.status().code(), ContextStatusCode::Failed);
        assert!(ctx.status().message().contains("cannot acquire resource"));
    }

    #[test]
    fn teardown_only_finishes_if_setup_ever_reached_ready() {
        let mut never_ready = ContextBuilder::new()
            .name("NeverReady")
            .setup(|| anyhow::bail!("boom"))
            .build("NeverReady")
            .unwrap();
        never_ready.run_setup();
        never_ready.run_teardown();
        assert_ne!(never_ready.status().code(), ContextStatusCode::Finished);

        let mut was_ready = ContextBuilder::new().name("WasReady").build("WasReady").unwrap();
        was_ready.run_setup();
        was_ready.run_teardown();
        assert_eq!(was_ready.status().code(), ContextStatusCode::Finished);
    }

    #[test]
    fn add_check_rejects_duplicate_id() {
        let mut ctx = ContextBuilder::new().name("X").build("X").unwrap();
        let id = dummy_id(0);
        ctx.add_check(id).unwrap();
        assert!(ctx.add_check(id).is_err());
        assert_eq!(ctx.checks().len(), 1);
    }

    #[test]
    fn teardown_panic_is_caught() {
        let mut ctx = ContextBuilder::new()
            .name("PanicTeardown")
            .teardown(|_| panic!("teardown exploded"))
            .build("PanicTeardown")
            .unwrap();
        ctx.run_setup();
        ctx.run_teardown();
        assert_eq!(ctx.status().code(), ContextStatusCode::Failed);
    }

    #[test]
    fn calling_run_teardown_twice_runs_the_hook_at_most_once() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_for_hook = calls.clone();
        let mut ctx = ContextBuilder::new()
            .name("DoubleTeardown")
            .teardown(move |_| {
                calls_for_hook.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .build("DoubleTeardown")
            .unwrap();
        ctx.run_setup();
        ctx.run_teardown();
        ctx.run_teardown();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(ctx.status().code(), ContextStatusCode::Finished);
    }

    #[test]
    fn finish_after_running_checks_transitions_to_finished_when_not_failed() {
        let mut ctx = ContextBuilder::new().name("X").build("X").unwrap();
        ctx.run_setup();
        ctx.finish_after_running_checks();
        assert_eq!(ctx.status().code(), ContextStatusCode::Finished);
    }

    #[test]
    fn finish_after_running_checks_leaves_a_failed_context_failed() {
        let mut ctx = ContextBuilder::new()
            .name("Failing")
            .setup(|| anyhow::bail!("boom"))
            .build("Failing")
            .unwrap();
        ctx.run_setup();
        assert_eq!(ctx.status().code(), ContextStatusCode::Failed);
        ctx.finish_after_running_checks();
        assert_eq!(ctx.status().code(), ContextStatusCode::Failed);
    }
}
