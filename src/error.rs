use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::node::Position;

pub type MarkdownResult<T> = Result<T, MarkdownError>;

/// Name reported as the `source` of every diagnostic raised by this crate.
pub const DIAGNOSTIC_SOURCE: &str = "incremark";

#[derive(Error, Debug, Clone)]
pub enum MarkdownError {
    #[error("Missing element factory: a renderer factory must be supplied before rendering")]
    MissingFactory,

    #[error("Unexpected combined `allowedElements` and `disallowedElements`, expected one or the other")]
    ConflictingElementFilters,

    #[error("{0}")]
    Diagnostic(Box<Diagnostic>),

    #[error("Markdown parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<Diagnostic> for MarkdownError {
    fn from(diagnostic: Diagnostic) -> Self {
        MarkdownError::Diagnostic(Box::new(diagnostic))
    }
}

impl From<serde_yaml::Error> for MarkdownError {
    fn from(err: serde_yaml::Error) -> Self {
        MarkdownError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MarkdownError {
    fn from(err: serde_json::Error) -> Self {
        MarkdownError::Config(err.to_string())
    }
}

impl MarkdownError {
    /// Returns the structured diagnostic if this error carries one
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            MarkdownError::Diagnostic(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the diagnostic rule id (`"style"`, `"mdx-estree"`), if any
    pub fn rule_id(&self) -> Option<&str> {
        self.diagnostic().map(|d| d.rule_id.as_str())
    }
}

/// A structured message raised while converting one tree.
///
/// Diagnostics abort the current pass only; the orchestrator and its cache
/// stay usable for the next call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub rule_id: String,
    pub source: String,
    /// Tag names of the enclosing elements, outermost first
    pub ancestors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rule_id: rule_id.into(),
            source: DIAGNOSTIC_SOURCE.to_string(),
            ancestors: Vec::new(),
            place: None,
            file: None,
            cause: None,
        }
    }

    pub fn with_ancestors(mut self, ancestors: &[String]) -> Self {
        self.ancestors = ancestors.to_vec();
        self
    }

    pub fn with_place(mut self, place: Option<Position>) -> Self {
        self.place = place;
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file)?;
        }
        if let Some(place) = &self.place {
            write!(f, "{}:{}: ", place.line, place.column)?;
        } else if self.file.is_some() {
            write!(f, " ")?;
        }
        write!(f, "{} ({}:{})", self.message, self.source, self.rule_id)?;
        if !self.ancestors.is_empty() {
            write!(f, " in <{}>", self.ancestors.join("> <"))?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}
