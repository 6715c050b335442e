//! Errors raised by the path template engine.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathEngineError {
    #[error("failed to read path template repo file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse path template repo file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no folder structure repo found (checked {0})")]
    RepoNotFound(PathBuf),

    #[error("no template named '{0}' is registered")]
    UnknownTemplate(String),

    #[error("template '{template}' references unknown token '{token}'")]
    UnknownToken { template: String, token: String },

    #[error("invalid placeholder pattern in template '{template}': {reason}")]
    InvalidTemplatePattern { template: String, reason: String },

    #[error("template reference cycle: {}", .chain.join(" -> "))]
    TemplateReferenceCycle { chain: Vec<String> },

    #[error("path does not match template '{template}'")]
    NoMatch { template: String },

    #[error("field '{field}' is required to solve template '{template}' but was not supplied")]
    MissingField { template: String, field: String },

    #[error(
        "field '{field}' appears more than once in template '{template}' with conflicting values '{first}' and '{second}'"
    )]
    FieldMismatch {
        template: String,
        field: String,
        first: String,
        second: String,
    },

    #[error("value '{value}' for field '{field}' does not match its token pattern in template '{template}'")]
    ValueDoesNotMatchPattern {
        template: String,
        field: String,
        value: String,
    },
}
