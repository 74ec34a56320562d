//! Action dispatch
//!
//! Routes a resolved action to the handler for its kind and normalizes the
//! handler's outcome into an [`ExecutionResult`]. A handler that panics is
//! contained here: the step fails with [`ActionError::HandlerFault`] and
//! the run carries on along the failure edge.

use crate::handlers;
use adbflow_core::{ActionError, ActionKind, ActionResult, ExecutionResult, ResolvedAction};
use adbflow_device::DeviceClient;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, instrument, warn};

/// Selects and invokes action handlers
///
/// Stateless; performs no device I/O itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionDispatcher;

impl ActionDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Run one resolved action against a device
    #[instrument(skip_all, fields(kind = %action.kind(), device = %device.identity()))]
    pub async fn dispatch(&self, action: &ResolvedAction, device: &dyn DeviceClient) -> ExecutionResult {
        let outcome = AssertUnwindSafe(invoke(action, device)).catch_unwind().await;

        let result = match outcome {
            Ok(result) => ExecutionResult::from(result),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(%message, "Action handler panicked");
                ExecutionResult::failure(ActionError::HandlerFault(message))
            }
        };

        debug!(success = result.is_success(), "Action dispatched");
        result
    }
}

async fn invoke(action: &ResolvedAction, device: &dyn DeviceClient) -> ActionResult {
    check_parameter_names(action)?;

    match action.kind() {
        ActionKind::Touch => handlers::touch::run(action, device).await,
        ActionKind::Typing => handlers::typing::run(action, device).await,
        ActionKind::Press => handlers::press::run(action, device).await,
        ActionKind::Apk => handlers::apk::run(action, device).await,
        ActionKind::Wait => handlers::wait::run(action).await,
        ActionKind::Unsupported(kind) => Err(ActionError::UnsupportedActionKind(kind.clone())),
    }
}

fn check_parameter_names(action: &ResolvedAction) -> Result<(), ActionError> {
    if let ActionKind::Unsupported(kind) = action.kind() {
        return Err(ActionError::UnsupportedActionKind(kind.clone()));
    }

    let allowed = action.kind().allowed_params();
    match action
        .parameters()
        .keys()
        .find(|name| !allowed.contains(&name.as_str()))
    {
        Some(name) => Err(ActionError::invalid(
            name.clone(),
            format!("not a parameter of '{}' actions", action.kind()),
        )),
        None => Ok(()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbflow_core::{params, KeyCode, Locator, Point};
    use adbflow_device::{
        Ack, DeviceCall, DeviceError, DeviceIdentity, DeviceOp, DeviceResult, PackageRequest,
        ScriptedDevice,
    };
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn resolved(kind: ActionKind, params: &[(&str, Value)]) -> ResolvedAction {
        ResolvedAction::new(
            kind,
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<IndexMap<_, _>>(),
        )
    }

    /// Panics on every command
    struct PanickingDevice(DeviceIdentity);

    #[async_trait]
    impl DeviceClient for PanickingDevice {
        fn identity(&self) -> &DeviceIdentity {
            &self.0
        }

        async fn tap(&self, _: &Locator, _: Option<Duration>) -> DeviceResult<Ack> {
            panic!("tap exploded")
        }

        async fn swipe(&self, _: &Locator, _: Point, _: Duration) -> DeviceResult<Ack> {
            panic!("swipe exploded")
        }

        async fn type_text(&self, text: &str) -> DeviceResult<Ack> {
            panic!("cannot type {}", text)
        }

        async fn send_key(&self, _: KeyCode) -> DeviceResult<Ack> {
            panic!("key exploded")
        }

        async fn install_or_launch(&self, _: &PackageRequest) -> DeviceResult<Ack> {
            panic!("install exploded")
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_kind() {
        let device = ScriptedDevice::new("emulator-5554");
        let dispatcher = ActionDispatcher::new();

        let result = dispatcher
            .dispatch(&resolved(ActionKind::Press, &[(params::KEY, json!("home"))]), &device)
            .await;
        assert!(result.is_success());
        assert_eq!(device.calls(), vec![DeviceCall::SendKey(KeyCode::Home)]);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_structured_failure() {
        let device = ScriptedDevice::new("emulator-5554");
        let action = resolved(ActionKind::from("unknown"), &[]);

        let result = ActionDispatcher::new().dispatch(&action, &device).await;
        assert!(!result.is_success());
        assert_eq!(
            result.error(),
            Some(&ActionError::UnsupportedActionKind("unknown".to_string()))
        );
        assert!(result.result().is_none());
        assert_eq!(device.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_parameter_rejected() {
        let device = ScriptedDevice::new("emulator-5554");
        let action = resolved(
            ActionKind::Typing,
            &[(params::TEXT, json!("hi")), ("speed", json!(3))],
        );

        let result = ActionDispatcher::new().dispatch(&action, &device).await;
        assert!(matches!(
            result.error(),
            Some(ActionError::InvalidParameter { name, .. }) if name == "speed"
        ));
        assert_eq!(device.call_count(), 0);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_fault() {
        let device = PanickingDevice(DeviceIdentity::new("boom"));
        let action = resolved(ActionKind::Typing, &[(params::TEXT, json!("hello"))]);

        let result = ActionDispatcher::new().dispatch(&action, &device).await;
        assert_eq!(
            result.error(),
            Some(&ActionError::HandlerFault("cannot type hello".to_string()))
        );

        let action = resolved(ActionKind::Press, &[(params::KEY, json!("back"))]);
        let result = ActionDispatcher::new().dispatch(&action, &device).await;
        assert_eq!(
            result.error(),
            Some(&ActionError::HandlerFault("key exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_device_failure_passes_through() {
        let device = ScriptedDevice::new("emulator-5554");
        device.reply(
            DeviceOp::TypeText,
            Err(DeviceError::Timeout(Duration::from_secs(15))),
        );
        let action = resolved(ActionKind::Typing, &[(params::TEXT, json!("slow"))]);

        let result = ActionDispatcher::new().dispatch(&action, &device).await;
        assert!(matches!(
            result.error(),
            Some(ActionError::DeviceCommandFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_never_touches_device() {
        let device = ScriptedDevice::new("emulator-5554");
        let action = resolved(ActionKind::Wait, &[(params::SLEEP_MILLIS, json!(0))]);

        let result = ActionDispatcher::new().dispatch(&action, &device).await;
        assert!(result.is_success());
        assert_eq!(device.call_count(), 0);
    }
}
