//! Step-level error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for action handlers: an optional payload on success
pub type ActionResult = Result<Option<serde_json::Value>, ActionError>;

/// Errors a single workflow step can fail with
///
/// Every variant is recoverable by workflow design: it is captured into an
/// [`crate::ExecutionResult`] and selects the step's failure edge.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail")]
pub enum ActionError {
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    #[error("unsupported action kind: {0}")]
    UnsupportedActionKind(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("locator not found: {0}")]
    LocatorNotFound(String),

    #[error("unknown key code: {0}")]
    UnknownKeyCode(String),

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("device command failed: {0}")]
    DeviceCommandFailed(String),

    #[error("handler fault: {0}")]
    HandlerFault(String),
}

impl ActionError {
    /// Shorthand for [`ActionError::InvalidParameter`]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code, as written in traces
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnboundVariable(_) => "UnboundVariable",
            Self::UnsupportedActionKind(_) => "UnsupportedActionKind",
            Self::InvalidParameter { .. } => "InvalidParameter",
            Self::LocatorNotFound(_) => "LocatorNotFound",
            Self::UnknownKeyCode(_) => "UnknownKeyCode",
            Self::PackageNotFound(_) => "PackageNotFound",
            Self::DeviceCommandFailed(_) => "DeviceCommandFailed",
            Self::HandlerFault(_) => "HandlerFault",
        }
    }
}
