//! ui
//!
//! User-facing output utilities.
//!
//! # Design
//!
//! All CLI output goes through [`output`] to keep verbosity handling
//! (quiet/normal/debug) consistent across every command.

pub mod output;
