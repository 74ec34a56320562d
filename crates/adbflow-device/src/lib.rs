//! Device client interface for adbflow
//!
//! The execution engine never talks to a phone directly. It drives a
//! [`DeviceClient`], which turns each abstract command (tap, type text,
//! send key, install or launch a package) into real device I/O and reports
//! a structured result. Transport retries are the client's business.
//!
//! Two clients ship with the crate:
//!
//! - [`AdbDevice`] - shells out to the `adb` binary
//! - [`ScriptedDevice`] - in-memory, records calls and answers from a script

mod adb;
mod scripted;
mod ui_dump;

pub use adb::{AdbConfig, AdbDevice};
pub use scripted::{DeviceCall, DeviceOp, ScriptedDevice};
pub use ui_dump::{Bounds, UiHierarchy, UiNode, UiSelector};

use adbflow_core::{KeyCode, Locator, Point};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for device commands
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors a device command can fail with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no element matches {0}")]
    LocatorNotFound(String),

    #[error("package not installed: {0}")]
    PackageNotFound(String),

    #[error("not supported by this device client: {0}")]
    Unsupported(String),

    /// A command argument the device cannot accept as given; `param`
    /// names the action parameter it came from
    #[error("cannot send {param}: {reason}")]
    InvalidInput { param: &'static str, reason: String },

    #[error("device command timed out after {0:?}")]
    Timeout(Duration),

    #[error("device transport error: {0}")]
    Transport(String),
}

/// Identity of the device a client is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Serial number as reported by `adb devices`
    pub serial: String,

    /// Model name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DeviceIdentity {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            model: None,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{} ({})", self.serial, model),
            None => f.write_str(&self.serial),
        }
    }
}

/// Acknowledgement of a device command, with optional detail
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl Ack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detail(detail: serde_json::Value) -> Self {
        Self {
            detail: Some(detail),
        }
    }
}

/// Install-or-launch request for an application package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Package identifier, e.g. `com.example.app`
    pub package: String,

    /// Local apk to install when the package is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk_path: Option<String>,
}

impl PackageRequest {
    pub fn launch(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            apk_path: None,
        }
    }
}

/// Asynchronous device-control client
///
/// Every call eventually resolves to an [`Ack`] or a [`DeviceError`].
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// The device this client is bound to
    fn identity(&self) -> &DeviceIdentity;

    /// Tap a target; `hold` turns the tap into a long press
    async fn tap(&self, locator: &Locator, hold: Option<Duration>) -> DeviceResult<Ack>;

    /// Swipe from a target to an absolute point
    async fn swipe(&self, from: &Locator, to: Point, duration: Duration) -> DeviceResult<Ack>;

    /// Type literal text into the focused field
    async fn type_text(&self, text: &str) -> DeviceResult<Ack>;

    /// Send a single key event
    async fn send_key(&self, key: KeyCode) -> DeviceResult<Ack>;

    /// Install the package if needed, then launch it
    async fn install_or_launch(&self, request: &PackageRequest) -> DeviceResult<Ack>;
}
