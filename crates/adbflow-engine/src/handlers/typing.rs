//! `typing`: send literal text to the focused field

use super::{ack_payload, device_error};
use adbflow_core::{params, ActionResult, ResolvedAction};
use adbflow_device::DeviceClient;
use tracing::debug;

pub async fn run(action: &ResolvedAction, device: &dyn DeviceClient) -> ActionResult {
    let text = action.require_string(params::TEXT)?;

    debug!(chars = text.chars().count(), "Typing text");
    device
        .type_text(&text)
        .await
        .map(ack_payload)
        .map_err(device_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbflow_core::{ActionError, ActionKind};
    use adbflow_device::{DeviceCall, DeviceError, DeviceOp, ScriptedDevice};
    use indexmap::IndexMap;
    use serde_json::json;

    fn typing(text: serde_json::Value) -> ResolvedAction {
        let mut parameters = IndexMap::new();
        parameters.insert(params::TEXT.to_string(), text);
        ResolvedAction::new(ActionKind::Typing, parameters)
    }

    #[tokio::test]
    async fn test_typing_sends_text() {
        let device = ScriptedDevice::new("emulator-5554");
        run(&typing(json!("hello world")), &device).await.unwrap();
        assert_eq!(
            device.calls(),
            vec![DeviceCall::TypeText("hello world".to_string())]
        );
    }

    #[tokio::test]
    async fn test_typing_transport_error() {
        let device = ScriptedDevice::new("emulator-5554").failing(
            DeviceOp::TypeText,
            DeviceError::Transport("device offline".to_string()),
        );
        let err = run(&typing(json!("x")), &device).await.unwrap_err();
        assert!(matches!(err, ActionError::DeviceCommandFailed(_)));
    }

    #[tokio::test]
    async fn test_typing_rejected_text_is_invalid_parameter() {
        let device = ScriptedDevice::new("emulator-5554").failing(
            DeviceOp::TypeText,
            DeviceError::InvalidInput {
                param: params::TEXT,
                reason: "control character U+0007".to_string(),
            },
        );
        let err = run(&typing(json!("ding\u{7}")), &device).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::InvalidParameter { ref name, .. } if name == "text"
        ));
    }
}
