//! `wait`: suspend the run without touching the device

use adbflow_core::{params, ActionError, ActionResult, ResolvedAction};
use std::time::Duration;
use tracing::debug;

/// Read the sleep duration, accepting `sleepTime` as an alias
pub(crate) fn sleep_duration(action: &ResolvedAction) -> Result<Duration, ActionError> {
    let name = match (action.has(params::SLEEP_MILLIS), action.has(params::SLEEP_TIME)) {
        (true, true) => {
            return Err(ActionError::invalid(
                params::SLEEP_MILLIS,
                "sleepMillis and sleepTime are mutually exclusive",
            ))
        }
        (false, true) => params::SLEEP_TIME,
        _ => params::SLEEP_MILLIS,
    };

    let millis = action.require_integer(name)?;
    let millis = u64::try_from(millis)
        .map_err(|_| ActionError::invalid(name, format!("must not be negative, got {}", millis)))?;
    Ok(Duration::from_millis(millis))
}

pub async fn run(action: &ResolvedAction) -> ActionResult {
    // Validate before suspending
    let duration = sleep_duration(action)?;

    debug!("Waiting for {:?}", duration);
    tokio::time::sleep(duration).await;
    Ok(None)
}
