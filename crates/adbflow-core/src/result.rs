//! Normalized step outcome

use crate::error::{ActionError, ActionResult};
use serde::Serialize;
use serde_json::Value;

/// Outcome of executing one action
///
/// Never partially filled: a successful result carries no error and a
/// failed result carries no payload. The fields are private so the only
/// way to build one is through [`ExecutionResult::success`] and
/// [`ExecutionResult::failure`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ActionError>,
}

impl ExecutionResult {
    /// A successful outcome with an optional payload
    pub fn success(result: Option<Value>) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    /// A failed outcome
    pub fn failure(error: ActionError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Payload of a successful outcome
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Error of a failed outcome
    pub fn error(&self) -> Option<&ActionError> {
        self.error.as_ref()
    }
}

impl From<ActionResult> for ExecutionResult {
    fn from(result: ActionResult) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(e) => Self::failure(e),
        }
    }
}
