//! In-memory device client
//!
//! [`ScriptedDevice`] records every command it receives and answers from a
//! script: queued one-shot replies first, then a per-operation default,
//! then a plain acknowledgement. It backs the engine tests and dry runs.

use crate::{Ack, DeviceClient, DeviceError, DeviceIdentity, DeviceResult, PackageRequest};
use adbflow_core::{KeyCode, Locator, Point};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Device operation, used to key scripted replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOp {
    Tap,
    Swipe,
    TypeText,
    SendKey,
    InstallOrLaunch,
}

/// A command received by a [`ScriptedDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Tap {
        locator: Locator,
        hold: Option<Duration>,
    },
    Swipe {
        from: Locator,
        to: Point,
        duration: Duration,
    },
    TypeText(String),
    SendKey(KeyCode),
    InstallOrLaunch(PackageRequest),
}

impl DeviceCall {
    pub fn op(&self) -> DeviceOp {
        match self {
            DeviceCall::Tap { .. } => DeviceOp::Tap,
            DeviceCall::Swipe { .. } => DeviceOp::Swipe,
            DeviceCall::TypeText(_) => DeviceOp::TypeText,
            DeviceCall::SendKey(_) => DeviceOp::SendKey,
            DeviceCall::InstallOrLaunch(_) => DeviceOp::InstallOrLaunch,
        }
    }
}

type CallHook = Box<dyn Fn(&DeviceCall) + Send + Sync>;

/// Scripted in-memory device client
pub struct ScriptedDevice {
    identity: DeviceIdentity,
    calls: Mutex<Vec<DeviceCall>>,
    queued: Mutex<HashMap<DeviceOp, VecDeque<DeviceResult<Ack>>>>,
    defaults: HashMap<DeviceOp, DeviceResult<Ack>>,
    latency: Option<Duration>,
    hook: Option<CallHook>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedDevice {
    /// A device that acknowledges every command
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            identity: DeviceIdentity::new(serial),
            calls: Mutex::new(Vec::new()),
            queued: Mutex::new(HashMap::new()),
            defaults: HashMap::new(),
            latency: None,
            hook: None,
        }
    }

    /// Answer every call of `op` with `error` unless a reply is queued
    pub fn failing(mut self, op: DeviceOp, error: DeviceError) -> Self {
        self.defaults.insert(op, Err(error));
        self
    }

    /// Delay every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Run `hook` for every call, right after it is recorded
    pub fn on_call(mut self, hook: impl Fn(&DeviceCall) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Queue a one-shot reply for the next call of `op`
    pub fn reply(&self, op: DeviceOp, result: DeviceResult<Ack>) {
        lock(&self.queued).entry(op).or_default().push_back(result);
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    async fn respond(&self, call: DeviceCall) -> DeviceResult<Ack> {
        let op = call.op();
        debug!(serial = %self.identity.serial, ?call, "Scripted device call");

        lock(&self.calls).push(call.clone());
        if let Some(hook) = &self.hook {
            hook(&call);
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let queued = lock(&self.queued).get_mut(&op).and_then(VecDeque::pop_front);
        match queued {
            Some(result) => result,
            None => self
                .defaults
                .get(&op)
                .cloned()
                .unwrap_or_else(|| Ok(Ack::new())),
        }
    }
}

#[async_trait]
impl DeviceClient for ScriptedDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    async fn tap(&self, locator: &Locator, hold: Option<Duration>) -> DeviceResult<Ack> {
        self.respond(DeviceCall::Tap {
            locator: locator.clone(),
            hold,
        })
        .await
    }

    async fn swipe(&self, from: &Locator, to: Point, duration: Duration) -> DeviceResult<Ack> {
        self.respond(DeviceCall::Swipe {
            from: from.clone(),
            to,
            duration,
        })
        .await
    }

    async fn type_text(&self, text: &str) -> DeviceResult<Ack> {
        self.respond(DeviceCall::TypeText(text.to_string())).await
    }

    async fn send_key(&self, key: KeyCode) -> DeviceResult<Ack> {
        self.respond(DeviceCall::SendKey(key)).await
    }

    async fn install_or_launch(&self, request: &PackageRequest) -> DeviceResult<Ack> {
        self.respond(DeviceCall::InstallOrLaunch(request.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_records_calls_and_acks() {
        let device = ScriptedDevice::new("scripted-1");

        device.send_key(KeyCode::Home).await.unwrap();
        device.type_text("hello").await.unwrap();

        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::SendKey(KeyCode::Home),
                DeviceCall::TypeText("hello".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_queued_replies_before_defaults() {
        let device = ScriptedDevice::new("scripted-1").failing(
            DeviceOp::Tap,
            DeviceError::LocatorNotFound("text 'OK'".to_string()),
        );
        device.reply(DeviceOp::Tap, Ok(Ack::new()));

        let locator = Locator::Text("OK".to_string());
        assert!(device.tap(&locator, None).await.is_ok());
        assert!(matches!(
            device.tap(&locator, None).await,
            Err(DeviceError::LocatorNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hook_runs_per_call() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let device = ScriptedDevice::new("scripted-1").on_call(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        device.send_key(KeyCode::Back).await.unwrap();
        device.send_key(KeyCode::Back).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(device.call_count(), 2);
    }
}
