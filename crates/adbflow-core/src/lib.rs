//! Core types for adbflow
//!
//! This crate provides the plain data types shared by the device client,
//! the execution engine and the configuration layer: actions and their
//! parameters, variable maps, resolved actions and execution results.
//!
//! # Key Types
//!
//! - [`Action`] - A typed automation instruction with raw parameters
//! - [`ResolvedAction`] - An action whose variable references are substituted
//! - [`ExecutionResult`] - The normalized outcome of running one action
//! - [`ActionError`] - Step-level failure taxonomy

mod action;
mod error;
mod key_code;
mod locator;
mod result;
mod variables;

pub use action::{
    split_template, Action, ActionKind, ParamValue, Parameters, ResolvedAction, TemplatePart,
};
pub use error::{ActionError, ActionResult};
pub use key_code::KeyCode;
pub use locator::{Locator, Point};
pub use result::ExecutionResult;
pub use variables::VariableValueMap;

/// Parameter names understood by the built-in action kinds
pub mod params {
    /// Touch: horizontal coordinate
    pub const X: &str = "x";
    /// Touch: vertical coordinate
    pub const Y: &str = "y";
    /// Touch: element path locator
    pub const XPATH: &str = "xpath";
    /// Touch: visible text locator; Typing: text to send
    pub const TEXT: &str = "text";
    /// Touch: image template locator
    pub const IMAGE: &str = "image";
    /// Touch: swipe end, horizontal
    pub const SWIPE_X: &str = "swipeX";
    /// Touch: swipe end, vertical
    pub const SWIPE_Y: &str = "swipeY";
    /// Touch: press or swipe duration
    pub const DURATION_MILLIS: &str = "durationMillis";
    /// Press: symbolic key code
    pub const KEY: &str = "key";
    /// Apk: package identifier
    pub const PACKAGE: &str = "package";
    /// Apk: local apk file to install when the package is missing
    pub const APK_PATH: &str = "apkPath";
    /// Wait: sleep duration in milliseconds
    pub const SLEEP_MILLIS: &str = "sleepMillis";
    /// Wait: legacy spelling of `sleepMillis`
    pub const SLEEP_TIME: &str = "sleepTime";
}
