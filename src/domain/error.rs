//! Domain error types.

use crate::domain::graph::{Handle, NamedKey, SeriesKey};

/// A parse error with position information for indicator and condition strings.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Errors raised while resolving or evaluating a graph.
///
/// Any of these aborts the pass that raised it; nothing fired during that
/// pass is dispatched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("cycle detected at node {handle}")]
    CycleDetected { handle: Handle },

    #[error("unknown handle {handle}")]
    UnknownHandle { handle: Handle },

    #[error("unknown key {key}")]
    UnknownKey { key: NamedKey },

    #[error("unsupported indicator: {name}")]
    UnsupportedIndicator { name: String },

    #[error("no base series supplied for {key}")]
    MissingBaseSeries { key: SeriesKey },

    #[error("invalid parameters for {indicator}: {reason}")]
    InvalidParameters { indicator: String, reason: String },
}

/// Top-level error type for indigraph.
#[derive(Debug, thiserror::Error)]
pub enum IndigraphError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&IndigraphError> for std::process::ExitCode {
    fn from(err: &IndigraphError) -> Self {
        let code: u8 = match err {
            IndigraphError::Io(_) => 1,
            IndigraphError::ConfigParse { .. }
            | IndigraphError::ConfigMissing { .. }
            | IndigraphError::ConfigInvalid { .. } => 2,
            IndigraphError::Data { .. } => 3,
            IndigraphError::RuleParse(_) | IndigraphError::RuleInvalid { .. } => 4,
            IndigraphError::Graph(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
