//! Provider error classification.

use std::fmt;

use thiserror::Error;

/// Coarse classification of a provider failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProviderErrorKind {
    /// The resource already exists.
    Conflict,
    /// The resource does not exist.
    NotFound,
    /// Quota or capacity exhausted for the request.
    Capacity,
    /// The credentials are not allowed to perform the request.
    Permission,
    /// Throttling, timeouts, dispatch failures and provider-side hiccups.
    Transient,
    /// Anything else, typically an invalid request.
    Other,
}

impl ProviderErrorKind {
    /// Short lowercase label used in logs and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::NotFound => "not found",
            Self::Capacity => "capacity",
            Self::Permission => "permission",
            Self::Transient => "transient",
            Self::Other => "rejected",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a control-plane operation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{operation} failed ({kind}): {message}")]
pub struct ProviderError {
    /// Classification used for control flow.
    pub kind: ProviderErrorKind,
    /// Operation that failed, for example `RunInstances`.
    pub operation: String,
    /// Provider error code when one was reported.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl ProviderError {
    /// Creates an error without a provider code.
    #[must_use]
    pub fn new(
        kind: ProviderErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            code: None,
            message: message.into(),
        }
    }

    /// Attaches the provider error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns `true` for "already exists" failures.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind == ProviderErrorKind::Conflict
    }

    /// Returns `true` for "does not exist" failures.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}
