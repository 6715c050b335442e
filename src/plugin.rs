//! plugin
//!
//! The ABI a compiled check-pack dynamic library exposes, and the
//! [`Registrar`] trait it registers checks/contexts/actions through.
//!
//! # Architecture
//!
//! spec.md §9 DESIGN NOTES "Dynamic class discovery" flags that Python's
//! `__get_classes_from_module` — importing an arbitrary `.py` file and
//! picking out its `SanityCheck`/`SharedContext` subclasses by
//! `issubclass` — has no type-safe Rust analogue, and offers two
//! redesigns: static registration linked at compile time, or a manifest
//! plus dynamic-library boundary. This crate takes the second option so
//! that [`crate::loader`] can still do what the source's loader does:
//! scan a directory at *run* time and discover what it contains, rather
//! than requiring every check pack to be compiled into this binary.
//!
//! A check pack is a `cdylib` exposing one `extern "C"` symbol,
//! [`ENTRY_POINT_SYMBOL`], of type [`RegisterFn`]. [`crate::loader`] loads
//! the library, looks up that symbol, and calls it with a `&mut dyn
//! Registrar` the pack uses to hand back its `Check`/`Context`/`Action`
//! instances.
//!
//! # Invariants
//!
//! - The entry point is looked up by a fixed name; a library missing it is
//!   skipped (logged, not fatal — matches the source's per-file
//!   log-and-continue loader behavior).
//! - `Registrar` methods take ownership of the builder output; a pack
//!   cannot observe what else has been registered.

use crate::action::Action;
use crate::check::Check;
use crate::context::Context;

/// The symbol name every check-pack dynamic library must export.
pub const ENTRY_POINT_SYMBOL: &[u8] = b"sanitycheck_register";

/// The signature of the exported entry point.
///
/// A check pack implements this as:
///
/// ```ignore
/// #[no_mangle]
/// pub extern "C" fn sanitycheck_register(registrar: &mut dyn Registrar) {
///     registrar.register_context(/* ... */);
///     registrar.register_check(/* ... */);
/// }
/// ```
pub type RegisterFn = unsafe extern "C" fn(&mut dyn Registrar);

/// What a check pack hands back to the loader during registration.
///
/// Implemented by [`crate::loader::Collector`]; check-pack authors only
/// ever see it as `&mut dyn Registrar`.
pub trait Registrar {
    fn register_check(&mut self, check: Check);
    fn register_context(&mut self, context: Context);
    fn register_action(&mut self, owner: &str, action: Action);
}

/// The concrete, in-process `Registrar` the loader hands to each pack's
/// entry point. Plain data collection; binding into the real registries
/// happens afterward in [`crate::loader`].
#[derive(Default)]
pub struct Collector {
    pub checks: Vec<Check>,
    pub contexts: Vec<Context>,
    pub orphan_actions: Vec<(String, Action)>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registrar for Collector {
    fn register_check(&mut self, check: Check) {
        self.checks.push(check);
    }

    fn register_context(&mut self, context: Context) {
        self.contexts.push(context);
    }

    fn register_action(&mut self, owner: &str, action: Action) {
        self.orphan_actions.push((owner.to_string(), action));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckBuilder, CheckOutcome};

    #[test]
    fn collector_records_registered_checks() {
        let mut collector = Collector::new();
        let check = CheckBuilder::new()
            .name("Demo")
            .check(|_| Ok(CheckOutcome::Passed))
            .build("Demo")
            .unwrap();
        collector.register_check(check);
        assert_eq!(collector.checks.len(), 1);
        assert_eq!(collector.checks[0].name(), "Demo");
    }

    #[test]
    fn collector_records_contexts_and_orphan_actions() {
        use crate::action::ActionBuilder;
        use crate::context::ContextBuilder;

        let mut collector = Collector::new();
        collector.register_context(ContextBuilder::new().name("Ctx").build("Ctx").unwrap());
        let action = ActionBuilder::new()
            .name("OpenFolder")
            .execute(|_| Ok(()))
            .build("OpenFolder")
            .unwrap();
        collector.register_action("Ctx", action);
        assert_eq!(collector.contexts.len(), 1);
        assert_eq!(collector.orphan_actions.len(), 1);
        assert_eq!(collector.orphan_actions[0].0, "Ctx");
    }
}
