//! `touch`: tap, long-press or swipe on a located target

use super::{ack_payload, device_error};
use adbflow_core::{params, ActionError, ActionResult, Locator, Point, ResolvedAction};
use adbflow_device::DeviceClient;
use std::time::Duration;
use tracing::debug;

/// Swipe duration when none is given
const DEFAULT_SWIPE_MILLIS: u64 = 300;

pub async fn run(action: &ResolvedAction, device: &dyn DeviceClient) -> ActionResult {
    let locator = locator(action)?;
    let swipe_to = swipe_target(action)?;
    let duration = match action.integer(params::DURATION_MILLIS)? {
        Some(ms) => Some(Duration::from_millis(u64::try_from(ms).map_err(|_| {
            ActionError::invalid(params::DURATION_MILLIS, "must not be negative")
        })?)),
        None => None,
    };

    let ack = match swipe_to {
        Some(to) => {
            let duration = duration.unwrap_or(Duration::from_millis(DEFAULT_SWIPE_MILLIS));
            debug!(%locator, %to, ?duration, "Swiping");
            device.swipe(&locator, to, duration).await
        }
        None => {
            debug!(%locator, hold = ?duration, "Tapping");
            device.tap(&locator, duration).await
        }
    };

    ack.map(ack_payload).map_err(device_error)
}

/// Build the single locator of a touch action
pub(crate) fn locator(action: &ResolvedAction) -> Result<Locator, ActionError> {
    let mut found = Vec::with_capacity(1);

    if action.has(params::X) || action.has(params::Y) {
        found.push(Locator::Coordinate(point(action, params::X, params::Y)?));
    }
    if let Some(path) = action.string(params::XPATH)? {
        found.push(Locator::ElementPath(path));
    }
    if let Some(text) = action.string(params::TEXT)? {
        found.push(Locator::Text(text));
    }
    if let Some(image) = action.string(params::IMAGE)? {
        found.push(Locator::Image(image));
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        n => Err(ActionError::invalid(
            "locator",
            format!(
                "exactly one of x/y, xpath, text or image must be set (found {})",
                n
            ),
        )),
    }
}

fn swipe_target(action: &ResolvedAction) -> Result<Option<Point>, ActionError> {
    if action.has(params::SWIPE_X) || action.has(params::SWIPE_Y) {
        point(action, params::SWIPE_X, params::SWIPE_Y).map(Some)
    } else {
        Ok(None)
    }
}

fn point(action: &ResolvedAction, x: &str, y: &str) -> Result<Point, ActionError> {
    Ok(Point::new(coordinate(action, x)?, coordinate(action, y)?))
}

fn coordinate(action: &ResolvedAction, name: &str) -> Result<i32, ActionError> {
    let value = action.require_integer(name)?;
    i32::try_from(value)
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| ActionError::invalid(name, format!("{} is not a screen coordinate", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbflow_core::ActionKind;
    use adbflow_device::{DeviceCall, DeviceError, DeviceOp, ScriptedDevice};
    use indexmap::IndexMap;
    use serde_json::{json, Value};

    fn touch(params: &[(&str, Value)]) -> ResolvedAction {
        let parameters: IndexMap<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        ResolvedAction::new(ActionKind::Touch, parameters)
    }

    #[tokio::test]
    async fn test_tap_coordinate() {
        let device = ScriptedDevice::new("emulator-5554");
        run(&touch(&[(params::X, json!(100)), (params::Y, json!("200"))]), &device)
            .await
            .unwrap();

        assert_eq!(
            device.calls(),
            vec![DeviceCall::Tap {
                locator: Locator::Coordinate(Point::new(100, 200)),
                hold: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_swipe_with_default_duration() {
        let device = ScriptedDevice::new("emulator-5554");
        let action = touch(&[
            (params::TEXT, json!("Inbox")),
            (params::SWIPE_X, json!(10)),
            (params::SWIPE_Y, json!(900)),
        ]);
        run(&action, &device).await.unwrap();

        assert_eq!(
            device.calls(),
            vec![DeviceCall::Swipe {
                from: Locator::Text("Inbox".to_string()),
                to: Point::new(10, 900),
                duration: Duration::from_millis(DEFAULT_SWIPE_MILLIS),
            }]
        );
    }

    #[tokio::test]
    async fn test_long_press() {
        let device = ScriptedDevice::new("emulator-5554");
        let action = touch(&[
            (params::XPATH, json!("//*[@resource-id='com.app:id/item']")),
            (params::DURATION_MILLIS, json!(800)),
        ]);
        run(&action, &device).await.unwrap();

        assert_eq!(
            device.calls(),
            vec![DeviceCall::Tap {
                locator: Locator::ElementPath("//*[@resource-id='com.app:id/item']".to_string()),
                hold: Some(Duration::from_millis(800)),
            }]
        );
    }

    #[tokio::test]
    async fn test_locator_not_found() {
        let device = ScriptedDevice::new("emulator-5554").failing(
            DeviceOp::Tap,
            DeviceError::LocatorNotFound("text 'Login'".to_string()),
        );
        let err = run(&touch(&[(params::TEXT, json!("Login"))]), &device)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::LocatorNotFound("text 'Login'".to_string()));
    }

    #[tokio::test]
    async fn test_bad_locators_fail_before_device() {
        let device = ScriptedDevice::new("emulator-5554");

        for action in [
            touch(&[]),
            touch(&[(params::TEXT, json!("a")), (params::IMAGE, json!("b.png"))]),
            touch(&[(params::X, json!(1))]),
            touch(&[(params::X, json!("left")), (params::Y, json!(2))]),
            touch(&[(params::X, json!(-5)), (params::Y, json!(2))]),
        ] {
            let err = run(&action, &device).await.unwrap_err();
            assert!(matches!(err, ActionError::InvalidParameter { .. }));
        }
        assert_eq!(device.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_locator_is_device_failure() {
        let device = ScriptedDevice::new("emulator-5554").failing(
            DeviceOp::Tap,
            DeviceError::Unsupported("image locators".to_string()),
        );
        let err = run(&touch(&[(params::IMAGE, json!("ok.png"))]), &device)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::DeviceCommandFailed(_)));
    }
}
