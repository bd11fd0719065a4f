//! Shared primitives used across trawl crates.

use thiserror::Error;

/// Result alias used across the workspace.
pub type TrawlResult<T> = Result<T, TrawlError>;

/// Broad failure category callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Relative URL without an established base, or an unusable URL.
    InvalidUrl,
    /// Network or HTTP level failure.
    Transport,
    /// Link or frame without a usable `href`/`src`.
    MissingTarget,
    /// Lookup by key or name found nothing.
    ElementNotFound,
    /// Form has several submit buttons and none was named.
    AmbiguousSubmit,
    /// Named submit button does not exist on the form.
    UnknownSubmitButton,
    /// Regular expression could not be compiled.
    InvalidPattern,
    /// Configuration value could not be interpreted.
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid-url",
            Self::Transport => "transport",
            Self::MissingTarget => "missing-target",
            Self::ElementNotFound => "element-not-found",
            Self::AmbiguousSubmit => "ambiguous-submit",
            Self::UnknownSubmitButton => "unknown-submit-button",
            Self::InvalidPattern => "invalid-pattern",
            Self::Config => "config",
        }
    }
}

/// Top-level error type: a kind, a stable dotted code and a human message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct TrawlError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    #[source]
    pub source: Option<Box<TrawlError>>,
}

impl TrawlError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn transport(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, code, message)
    }

    pub fn invalid_url(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidUrl, code, message)
    }

    pub fn with_source(mut self, source: TrawlError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
