//! Structured error types shared across clampsim crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`ClampError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (protocol names, cell indices, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the simulator core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum ClampError {
    /// Unparseable condition-matrix cell or reference-data field.
    #[error("parse error: {0}")]
    Parse(ErrorInfo),
    /// Waveform or summary expression produced a result of the wrong shape.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Spectral decomposition or linear solve failed.
    #[error("numerical failure: {0}")]
    Numerical(ErrorInfo),
    /// Error propagated from the model provider.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// The abort flag was observed; partial outputs must be discarded.
    #[error("aborted: {0}")]
    Aborted(ErrorInfo),
    /// Unrecognised failure from a nested evaluator.
    #[error("internal error: {0}")]
    Internal(ErrorInfo),
}

impl ClampError {
    /// Returns the structured payload regardless of variant.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ClampError::Parse(info)
            | ClampError::Shape(info)
            | ClampError::Numerical(info)
            | ClampError::Model(info)
            | ClampError::Aborted(info)
            | ClampError::Internal(info) => info,
        }
    }

    /// Shorthand for an [`ClampError::Aborted`] raised at a cancellation point.
    pub fn aborted() -> Self {
        ClampError::Aborted(ErrorInfo::new("aborted", "abort flag observed"))
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ClampError>;
