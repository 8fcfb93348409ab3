//! Structured error types shared across treehist crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic payload carried by every [`TreehistError`] variant.
///
/// `code` is a stable kebab-case identifier drivers can match on without
/// parsing the message; `context` carries the indices involved (node, site,
/// states, rates) so a failed proposal can be located in a long run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Key value pairs locating the failure (node, site, state indices).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a payload with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Attaches one context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the treehist sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum TreehistError {
    /// Construction-time configuration and dimension errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Rate matrix validation and transition probability errors.
    #[error("rate error: {0}")]
    Rate(ErrorInfo),
    /// Branch history access and consistency errors.
    #[error("history error: {0}")]
    History(ErrorInfo),
    /// Runtime failures inside an MCMC proposal.
    #[error("proposal error: {0}")]
    Proposal(ErrorInfo),
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

impl TreehistError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            TreehistError::Config(info)
            | TreehistError::Rate(info)
            | TreehistError::History(info)
            | TreehistError::Proposal(info) => info,
        }
    }
}
