//! pathengine
//!
//! A companion subsystem, independent of the check/context orchestration
//! engine: a bidirectional path template parser/solver grounded on
//! `original_source/FolderStructure`.
//!
//! See [`Template`] for the per-template parse/solve logic and
//! [`FolderStructure`] for loading a whole repo of declared tokens and
//! templates.

mod error;
mod folderstructure;
mod template;
mod token;

pub use error::PathEngineError;
pub use folderstructure::FolderStructure;
pub use template::{Anchor, Template};
pub use token::{Token, DEFAULT_PATTERN};
