//! `press`: send one key event by symbolic name

use super::{ack_payload, device_error};
use adbflow_core::{params, ActionResult, KeyCode, ResolvedAction};
use adbflow_device::DeviceClient;
use serde_json::json;
use tracing::debug;

pub async fn run(action: &ResolvedAction, device: &dyn DeviceClient) -> ActionResult {
    // Unsupported names fail here, before the device is contacted
    let key: KeyCode = action.require_string(params::KEY)?.parse()?;

    debug!(%key, code = key.android_code(), "Pressing key");
    let ack = device.send_key(key).await.map_err(device_error)?;

    Ok(ack_payload(ack).or_else(|| Some(json!({ "key": key.name(), "code": key.android_code() }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbflow_core::{ActionError, ActionKind};
    use adbflow_device::{DeviceCall, ScriptedDevice};
    use indexmap::IndexMap;

    fn press(key: &str) -> ResolvedAction {
        let mut parameters = IndexMap::new();
        parameters.insert(params::KEY.to_string(), json!(key));
        ResolvedAction::new(ActionKind::Press, parameters)
    }

    #[tokio::test]
    async fn test_press_back() {
        let device = ScriptedDevice::new("emulator-5554");
        let payload = run(&press("back"), &device).await.unwrap();

        assert_eq!(device.calls(), vec![DeviceCall::SendKey(KeyCode::Back)]);
        assert_eq!(payload, Some(json!({"key": "back", "code": 4})));
    }

    #[tokio::test]
    async fn test_press_unknown_key_never_reaches_device() {
        let device = ScriptedDevice::new("emulator-5554");
        let err = run(&press("warp_drive"), &device).await.unwrap_err();

        assert!(matches!(err, ActionError::UnknownKeyCode(_)));
        assert_eq!(device.call_count(), 0);
    }
}
