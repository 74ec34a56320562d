//! Action handlers, one per action kind
//!
//! Each handler receives a [`ResolvedAction`](adbflow_core::ResolvedAction)
//! already matched to its kind, checks the concrete parameter values, and
//! turns them into device client calls. Handlers never panic on bad input;
//! every problem is an [`ActionError`].

pub mod apk;
pub mod press;
pub mod touch;
pub mod typing;
pub mod wait;

use adbflow_core::ActionError;
use adbflow_device::{Ack, DeviceError};
use serde_json::Value;
use tracing::warn;

/// Map a device client failure onto the step-level taxonomy
pub(crate) fn device_error(error: DeviceError) -> ActionError {
    match error {
        DeviceError::LocatorNotFound(target) => ActionError::LocatorNotFound(target),
        DeviceError::PackageNotFound(package) => ActionError::PackageNotFound(package),
        DeviceError::InvalidInput { param, reason } => ActionError::invalid(param, reason),
        other => {
            warn!(error = %other, "Device command failed");
            ActionError::DeviceCommandFailed(other.to_string())
        }
    }
}

/// Payload recorded for an acknowledged command
pub(crate) fn ack_payload(ack: Ack) -> Option<Value> {
    ack.detail
}
