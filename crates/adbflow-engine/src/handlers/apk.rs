//! `apk`: install (when an apk path is given) and launch a package

use super::{ack_payload, device_error};
use adbflow_core::{params, ActionError, ActionResult, ResolvedAction};
use adbflow_device::{DeviceClient, PackageRequest};
use tracing::debug;

pub async fn run(action: &ResolvedAction, device: &dyn DeviceClient) -> ActionResult {
    let package = action.require_string(params::PACKAGE)?;
    if package.trim().is_empty() {
        return Err(ActionError::invalid(params::PACKAGE, "must not be empty"));
    }

    let request = PackageRequest {
        package: package.trim().to_string(),
        apk_path: action
            .string(params::APK_PATH)?
            .filter(|path| !path.trim().is_empty()),
    };

    debug!(package = %request.package, apk = ?request.apk_path, "Install or launch");
    device
        .install_or_launch(&request)
        .await
        .map(ack_payload)
        .map_err(device_error)
}
