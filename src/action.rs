//! action
//!
//! User-triggered side effects attached to a `Check` or `Context`.
//!
//! # Architecture
//!
//! An `Action` is never invoked by the engine's own lifecycle — it is a
//! side channel a host (CLI, GUI, whatever embeds this crate) exposes to the
//! user and runs on explicit request, e.g. "open the folder this check
//! complained about".
//!
//! # Invariants
//!
//! - `name`/`description` obey the same length limits as `Check`.
//! - A panicking or erroring `_execute` never propagates past `run`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::status::ImplementationError;

const NAME_CHAR_LIMIT: usize = 50;
const DESCRIPTION_CHAR_LIMIT: usize = 140;

/// Errors raised while running an action's `_execute` hook.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unhandled exception raised running {name}._execute(): {message}")]
    Failed { name: String, message: String },
}

type ExecuteHook = Box<dyn FnMut(&mut dyn Any) -> anyhow::Result<()> + Send>;

/// A registered side effect.
///
/// Built via [`ActionBuilder`]; authors never construct this directly.
pub struct Action {
    name: String,
    description: String,
    execute: ExecuteHook,
}

impl Action {
    /// Runs `_execute` under the same exception guard as check/context
    /// hooks: a panic or `Err` is captured and reported, never propagated.
    pub fn run(&mut self, shared: &mut dyn Any) -> Result<(), ActionError> {
        let execute = &mut self.execute;
        let result = panic::catch_unwind(AssertUnwindSafe(|| execute(shared)));
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ActionError::Failed {
                name: self.name.clone(),
                message: err.to_string(),
            }),
            Err(panic) => Err(ActionError::Failed {
                name: self.name.clone(),
                message: panic_message(panic),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

/// Builds an [`Action`], validating name/description length at `build()`.
pub struct ActionBuilder {
    name: Option<String>,
    description: String,
    execute: Option<ExecuteHook>,
}

impl ActionBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            description: String::new(),
            execute: None,
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

    pub fn execute<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn Any) -> anyhow::Result<()> + Send + 'static,
    {
        self.execute = Some(Box::new(hook));
        self
    }

    pub fn build(self, default_name: &str) -> Result<Action, ImplementationError> {
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
        let execute = self.execute.ok_or(ImplementationError::MissingRequiredHook {
            builder: "ActionBuilder",
            hook: "execute",
        })?;
        Ok(Action {
            name,
            description: self.description,
            execute,
        })
    }
}

impl Default for ActionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_reports_error_without_propagating() {
        let mut action = ActionBuilder::new()
            .name("BadAction")
            .execute(|_| anyhow::bail!("boom"))
            .build("BadAction")
            .unwrap();

        let mut ctx: Box<dyn Any> = Box::new(());
        let result = action.run(ctx.as_mut());
        assert!(matches!(result, Err(ActionError::Failed { .. })));
    }

    #[test]
    fn run_catches_panics() {
        let mut action = ActionBuilder::new()
            .name("Panicky")
            .execute(|_| panic!("kaboom"))
            .build("Panicky")
            .unwrap();
        let mut ctx: Box<dyn Any> = Box::new(());
        let result = action.run(ctx.as_mut());
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_missing_execute_hook() {
        let result = ActionBuilder::new().name("x").build("x");
        assert!(matches!(
            result,
            Err(ImplementationError::MissingRequiredHook { builder: "ActionBuilder", hook: "execute" })
        ));
    }

    #[test]
    fn build_rejects_overlong_name() {
        let err = ActionBuilder::new()
            .name("x".repeat(51))
            .execute(|_| Ok(()))
            .build("x")
            .unwrap_err();
        assert!(matches!(err, ImplementationError::NameTooLong { .. }));
    }

    #[test]
    fn name_defaults_to_class_like_default() {
        let action = ActionBuilder::new()
            .execute(|_| Ok(()))
            .build("DefaultName")
            .unwrap();
        assert_eq!(action.name(), "DefaultName");
    }
}
