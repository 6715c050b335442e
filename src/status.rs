//! status
//!
//! Tagged state for checks and contexts, with an append-only message log
//! and a push-model "updated" signal.
//!
//! # Architecture
//!
//! `CheckStatus` and `ContextStatus` are plain structs, not trait objects:
//! both carry a validated code, a message log that only ever grows during a
//! single execution, and a list of observers that are notified synchronously
//! on every mutation. There is no shared base type between the two — their
//! code ranges differ and mixing them up is a caller bug we want the
//! compiler to catch.
//!
//! # Invariants
//!
//! - `code` is always one of the variants of `CheckStatusCode` /
//!   `ContextStatusCode`; there is no way to construct an out-of-range code.
//! - The message log never shrinks during a run; only `add_message` appends.
//! - `updated` observers are never invoked with a payload and are never
//!   allowed to block the mutator — a slow observer is the observer's
//!   problem, not the status's.

use std::fmt;

use thiserror::Error;

/// Errors raised by status setters.
///
/// Mirrors the author-caused error taxonomy: these are engine-internal
/// mistakes (an invalid numeric code reaching a setter) and are never
/// swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImplementationError {
    /// An out-of-range status code was supplied.
    #[error("invalid status code value '{0}'")]
    InvalidStatusCode(i32),

    /// A name exceeded the allowed character limit.
    #[error("name must be {limit} characters or fewer, got {len}")]
    NameTooLong { limit: usize, len: usize },

    /// A description exceeded the allowed character limit.
    #[error("description must be {limit} characters or fewer, got {len}")]
    DescriptionTooLong { limit: usize, len: usize },

    /// A priority fell outside the valid range.
    #[error("priority must be between {min} and {max}, got {value}")]
    PriorityOutOfRange { min: i32, max: i32, value: i32 },

    /// A duplicate check/context was registered where uniqueness is required.
    #[error("{0}")]
    Duplicate(String),

    /// A builder was asked to `build()` without its one mandatory hook set.
    #[error("{builder}::build called without calling .{hook}(...) first")]
    MissingRequiredHook { builder: &'static str, hook: &'static str },
}

/// An observer callback fired whenever a status mutates.
///
/// No payload is passed: observers re-read whatever status fields they
/// care about. This keeps the signal a pure notification, matching the
/// "push, never pull" rule for observable status.
type Observer = Box<dyn FnMut() + Send>;

/// A synchronous fan-out notification list.
///
/// Dispatch is synchronous and unbuffered: every observer runs inline on
/// the mutator's thread, in subscription order. Since the engine is
/// strictly single-threaded and cooperative, this is never a contention
/// point; a host that needs to decouple from a slow observer should make
/// its own observer non-blocking (e.g. pushing onto a channel).
#[derive(Default)]
pub struct StatusSignal {
    observers: Vec<Observer>,
}

impl StatusSignal {
    /// Creates an empty signal with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a new observer. Zero or more may be registered.
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Fires the signal, invoking every observer in subscription order.
    pub fn emit(&mut self) {
        for observer in &mut self.observers {
            observer();
        }
    }
}

impl fmt::Debug for StatusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSignal")
            .field("subscriber_count", &self.observers.len())
            .finish()
    }
}

/// Terminal/transient code for a [`CheckStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckStatusCode {
    Passed,
    NotPassed,
    Failed,
    Cancelled,
    NotRan,
    Running,
}

impl CheckStatusCode {
    /// All valid codes, in the order the source assigns their integer values.
    pub const ALL: [CheckStatusCode; 6] = [
        CheckStatusCode::Passed,
        CheckStatusCode::NotPassed,
        CheckStatusCode::Failed,
        CheckStatusCode::Cancelled,
        CheckStatusCode::NotRan,
        CheckStatusCode::Running,
    ];

    /// The lowercase tag used by `status_as_string` in the source.
    pub fn as_tag(&self) -> &'static str {
        match self {
            CheckStatusCode::Passed => "passed",
            CheckStatusCode::NotPassed => "not_passed",
            CheckStatusCode::Failed => "failed",
            CheckStatusCode::Cancelled => "cancelled",
            CheckStatusCode::NotRan => "not_ran",
            CheckStatusCode::Running => "running",
        }
    }

    fn from_i32(code: i32) -> Result<Self, ImplementationError> {
        match code {
            0 => Ok(CheckStatusCode::Passed),
            1 => Ok(CheckStatusCode::NotPassed),
            2 => Ok(CheckStatusCode::Failed),
            3 => Ok(CheckStatusCode::Cancelled),
            4 => Ok(CheckStatusCode::NotRan),
            5 => Ok(CheckStatusCode::Running),
            other => Err(ImplementationError::InvalidStatusCode(other)),
        }
    }
}

impl fmt::Display for CheckStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// Mutable state for a single `Check` run.
///
/// # Example
///
/// ```
/// use sanitycheck::status::{CheckStatus, CheckStatusCode};
///
/// let mut status = CheckStatus::new(CheckStatusCode::NotRan);
/// status.add_message("starting up");
/// assert_eq!(status.code(), CheckStatusCode::NotRan);
/// assert_eq!(status.message(), "starting up");
/// assert_eq!(status.len(), 1);
/// ```
pub struct CheckStatus {
    code: CheckStatusCode,
    messages: Vec<String>,
    signal: StatusSignal,
}

impl CheckStatus {
    /// Creates a status with the given initial code and no messages.
    pub fn new(code: CheckStatusCode) -> Self {
        Self {
            code,
            messages: Vec::new(),
            signal: StatusSignal::new(),
        }
    }

    /// Creates a status from a raw integer code, validating its range.
    pub fn from_code(code: i32) -> Result<Self, ImplementationError> {
        Ok(Self::new(CheckStatusCode::from_i32(code)?))
    }

    pub fn code(&self) -> CheckStatusCode {
        self.code
    }

    /// Sets the code, firing the updated signal. The code is always valid
    /// by construction (it's a `CheckStatusCode`, not a raw integer), so
    /// this cannot fail the way the source's `code` setter can.
    pub fn set_code(&mut self, code: CheckStatusCode) {
        self.code = code;
        self.signal.emit();
    }

    /// The concatenation of every appended message, one per line.
    pub fn message(&self) -> String {
        self.messages.join("\n.")
    }

    /// Appends a message and fires the updated signal. Never removes
    /// previously appended messages.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
        self.signal.emit();
    }

    /// Number of messages appended so far.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.signal.subscribe(observer);
    }
}

impl fmt::Debug for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckStatus")
            .field("code", &self.code)
            .field("messages", &self.messages)
            .finish()
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Equality is defined on code only, matching the source's `__eq__`.
impl PartialEq for CheckStatus {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}
impl Eq for CheckStatus {}

/// Terminal/transient code for a [`ContextStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextStatusCode {
    Ready,
    NotReady,
    Failed,
    Cancelled,
    Finished,
}

impl ContextStatusCode {
    pub const ALL: [ContextStatusCode; 5] = [
        ContextStatusCode::Ready,
        ContextStatusCode::NotReady,
        ContextStatusCode::Failed,
        ContextStatusCode::Cancelled,
        ContextStatusCode::Finished,
    ];

    pub fn as_tag(&self) -> &'static str {
        match self {
            ContextStatusCode::Ready => "ready",
            ContextStatusCode::NotReady => "not_ready",
            ContextStatusCode::Failed => "failed",
            ContextStatusCode::Cancelled => "cancelled",
            ContextStatusCode::Finished => "finished",
        }
    }

    fn from_i32(code: i32) -> Result<Self, ImplementationError> {
        match code {
            0 => Ok(ContextStatusCode::Ready),
            1 => Ok(ContextStatusCode::NotReady),
            2 => Ok(ContextStatusCode::Failed),
            3 => Ok(ContextStatusCode::Cancelled),
            4 => Ok(ContextStatusCode::Finished),
            other => Err(ImplementationError::InvalidStatusCode(other)),
        }
    }
}

impl fmt::Display for ContextStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// Mutable state for a `Context`'s setup/checks/teardown run.
///
/// Initial code is always [`ContextStatusCode::NotReady`], matching the
/// source's constructor behavior regardless of what the caller passes.
pub struct ContextStatus {
    code: ContextStatusCode,
    messages: Vec<String>,
    signal: StatusSignal,
}

impl ContextStatus {
    pub fn new() -> Self {
        Self {
            code: ContextStatusCode::NotReady,
            messages: Vec::new(),
            signal: StatusSignal::new(),
        }
    }

    pub fn from_code(code: i32) -> Result<Self, ImplementationError> {
        let mut status = Self::new();
        status.code = ContextStatusCode::from_i32(code)?;
        Ok(status)
    }

    pub fn code(&self) -> ContextStatusCode {
        self.code
    }

    pub fn set_code(&mut self, code: ContextStatusCode) {
        self.code = code;
        self.signal.emit();
    }

    pub fn message(&self) -> String {
        self.messages.join("\n.")
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
        self.signal.emit();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.signal.subscribe(observer);
    }
}

impl Default for ContextStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStatus")
            .field("code", &self.code)
            .field("messages", &self.messages)
            .finish()
    }
}

impl fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl PartialEq for ContextStatus {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}
impl Eq for ContextStatus {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn check_status_default_fields() {
        let status = CheckStatus::new(CheckStatusCode::NotRan);
        assert_eq!(status.code(), CheckStatusCode::NotRan);
        assert_eq!(status.message(), "");
        assert_eq!(status.len(), 0);
        assert!(status.is_empty());
    }

    #[test]
    fn check_status_from_code_rejects_out_of_range() {
        assert!(CheckStatus::from_code(6).is_err());
        assert!(CheckStatus::from_code(-1).is_err());
        assert!(CheckStatus::from_code(0).is_ok());
    }

    #[test]
    fn add_message_appends_and_never_shrinks() {
        let mut status = CheckStatus::new(CheckStatusCode::Running);
        status.add_message("first");
        status.add_message("second");
        assert_eq!(status.len(), 2);
        assert_eq!(status.message(), "first\n.second");
    }

    #[test]
    fn equality_is_defined_on_code_only() {
        let mut a = CheckStatus::new(CheckStatusCode::Passed);
        let b = CheckStatus::new(CheckStatusCode::Passed);
        a.add_message("unrelated to equality");
        assert_eq!(a, b);

        let c = CheckStatus::new(CheckStatusCode::Failed);
        assert_ne!(a, c);
    }

    #[test]
    fn updated_signal_fires_on_every_mutation() {
        let mut status = CheckStatus::new(CheckStatusCode::NotRan);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        status.subscribe(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        status.set_code(CheckStatusCode::Running);
        status.add_message("hello");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn context_status_new_defaults_to_not_ready() {
        let status = ContextStatus::new();
        assert_eq!(status.code(), ContextStatusCode::NotReady);
    }

    #[test]
    fn context_status_from_code_rejects_out_of_range() {
        assert!(ContextStatus::from_code(42).is_err());
        assert!(ContextStatus::from_code(0).is_ok());
    }

    #[test]
    fn context_status_tags_match_source_strings() {
        assert_eq!(ContextStatusCode::Ready.as_tag(), "ready");
        assert_eq!(ContextStatusCode::NotReady.as_tag(), "not_ready");
        assert_eq!(ContextStatusCode::Finished.as_tag(), "finished");
    }
}
