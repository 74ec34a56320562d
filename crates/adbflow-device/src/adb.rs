//! Device client backed by the `adb` command-line tool

use crate::ui_dump::{UiHierarchy, UiSelector};
use crate::{Ack, DeviceClient, DeviceError, DeviceIdentity, DeviceResult, PackageRequest};
use adbflow_core::{params, KeyCode, Locator, Point};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, trace, warn};

/// Settings for [`AdbDevice`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdbConfig {
    /// Path to the adb executable
    pub binary: PathBuf,

    /// Default device serial when none is given on the command line
    pub serial: Option<String>,

    /// Per-command timeout
    pub command_timeout_ms: u64,

    /// Typing sends text in chunks of this many characters
    pub text_chunk: usize,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("adb"),
            serial: None,
            command_timeout_ms: 15_000,
            text_chunk: 64,
        }
    }
}

/// Device client that drives one device through `adb -s <serial>`
pub struct AdbDevice {
    config: AdbConfig,
    identity: DeviceIdentity,
}

impl AdbDevice {
    pub fn new(config: AdbConfig, serial: impl Into<String>) -> Self {
        Self {
            config,
            identity: DeviceIdentity::new(serial),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.command_timeout_ms)
    }

    /// Run `adb -s <serial> <args>` and return its stdout
    async fn adb(&self, args: &[&str]) -> DeviceResult<String> {
        trace!(serial = %self.identity.serial, "adb {}", args.join(" "));

        let mut command = Command::new(&self.config.binary);
        command
            .arg("-s")
            .arg(&self.identity.serial)
            .args(args)
            .kill_on_drop(true);

        let timeout = self.timeout();
        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| DeviceError::Timeout(timeout))?
            .map_err(|e| {
                DeviceError::Transport(format!(
                    "failed to run {}: {}",
                    self.config.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(serial = %self.identity.serial, status = %output.status, "adb command failed");
            return Err(DeviceError::Transport(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn shell(&self, args: &[&str]) -> DeviceResult<String> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.adb(&full).await
    }

    async fn dump_hierarchy(&self) -> DeviceResult<UiHierarchy> {
        let xml = self
            .adb(&["exec-out", "uiautomator", "dump", "/dev/tty"])
            .await?;
        let hierarchy = UiHierarchy::parse(&xml);
        debug!(nodes = hierarchy.len(), "Dumped UI hierarchy");
        Ok(hierarchy)
    }

    /// Turn a locator into a screen coordinate
    async fn resolve_point(&self, locator: &Locator) -> DeviceResult<Point> {
        match locator {
            Locator::Coordinate(point) => Ok(*point),
            Locator::Text(text) => {
                let ui = self.dump_hierarchy().await?;
                ui.find_by_text(text)
                    .and_then(|node| node.bounds)
                    .map(|bounds| bounds.center())
                    .ok_or_else(|| DeviceError::LocatorNotFound(locator.to_string()))
            }
            Locator::ElementPath(path) => {
                let selector = UiSelector::parse(path)?;
                let ui = self.dump_hierarchy().await?;
                ui.find(&selector)
                    .and_then(|node| node.bounds)
                    .map(|bounds| bounds.center())
                    .ok_or_else(|| DeviceError::LocatorNotFound(locator.to_string()))
            }
            Locator::Image(_) => Err(DeviceError::Unsupported(
                "image template matching".to_string(),
            )),
        }
    }

    /// `pm list packages` filters by substring and exits 0 when nothing
    /// matches, so a failure here is a real transport problem
    async fn is_installed(&self, package: &str) -> DeviceResult<bool> {
        let listing = self.shell(&["pm", "list", "packages", package]).await?;
        let wanted = format!("package:{}", package);
        Ok(listing.lines().any(|line| line.trim() == wanted))
    }
}

#[async_trait]
impl DeviceClient for AdbDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[instrument(skip(self), fields(serial = %self.identity.serial))]
    async fn tap(&self, locator: &Locator, hold: Option<Duration>) -> DeviceResult<Ack> {
        let point = self.resolve_point(locator).await?;
        let (x, y) = (point.x.to_string(), point.y.to_string());

        match hold {
            Some(duration) => {
                let ms = duration.as_millis().to_string();
                self.shell(&["input", "swipe", x.as_str(), y.as_str(), x.as_str(), y.as_str(), ms.as_str()])
                    .await?;
            }
            None => {
                self.shell(&["input", "tap", x.as_str(), y.as_str()]).await?;
            }
        }

        debug!(%point, "Tapped");
        Ok(Ack::with_detail(json!({ "x": point.x, "y": point.y })))
    }

    #[instrument(skip(self), fields(serial = %self.identity.serial))]
    async fn swipe(&self, from: &Locator, to: Point, duration: Duration) -> DeviceResult<Ack> {
        let start = self.resolve_point(from).await?;
        let args = [
            start.x.to_string(),
            start.y.to_string(),
            to.x.to_string(),
            to.y.to_string(),
            duration.as_millis().to_string(),
        ];
        let mut full = vec!["input", "swipe"];
        full.extend(args.iter().map(String::as_str));
        self.shell(&full).await?;

        debug!(from = %start, to = %to, "Swiped");
        Ok(Ack::with_detail(json!({
            "from": { "x": start.x, "y": start.y },
            "to": { "x": to.x, "y": to.y },
        })))
    }

    #[instrument(skip(self, text), fields(serial = %self.identity.serial, len = text.len()))]
    async fn type_text(&self, text: &str) -> DeviceResult<Ack> {
        let inputs = plan_text_input(text, self.config.text_chunk)?;
        for input in &inputs {
            match input {
                TextInput::Text(piece) => {
                    let encoded = encode_input_text(piece);
                    self.shell(&["input", "text", encoded.as_str()]).await?;
                }
                TextInput::Key(key) => {
                    let code = key.android_code().to_string();
                    self.shell(&["input", "keyevent", code.as_str()]).await?;
                }
            }
        }
        debug!(commands = inputs.len(), "Typed text");
        Ok(Ack::new())
    }

    #[instrument(skip(self), fields(serial = %self.identity.serial))]
    async fn send_key(&self, key: KeyCode) -> DeviceResult<Ack> {
        let code = key.android_code().to_string();
        self.shell(&["input", "keyevent", code.as_str()]).await?;
        Ok(Ack::with_detail(json!({ "keycode": key.android_code() })))
    }

    #[instrument(skip(self), fields(serial = %self.identity.serial))]
    async fn install_or_launch(&self, request: &PackageRequest) -> DeviceResult<Ack> {
        let mut installed_now = false;

        if !self.is_installed(&request.package).await? {
            let Some(apk_path) = &request.apk_path else {
                return Err(DeviceError::PackageNotFound(request.package.clone()));
            };
            debug!(package = %request.package, apk = %apk_path, "Installing package");
            self.adb(&["install", "-r", apk_path.as_str()]).await?;
            installed_now = true;
        }

        self.shell(&[
            "monkey",
            "-p",
            request.package.as_str(),
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;

        debug!(package = %request.package, "Launched package");
        Ok(Ack::with_detail(json!({
            "package": request.package,
            "installed": installed_now,
        })))
    }
}

/// One device command produced while typing
#[derive(Debug, Clone, PartialEq, Eq)]
enum TextInput {
    Text(String),
    Key(KeyCode),
}

/// Split text into `input text` pieces and key events
///
/// Line breaks (`\n`, `\r`, `\r\n`) become ENTER and tabs become TAB,
/// since `input text` cannot carry them. Any other control character is
/// rejected before anything reaches the device. Pieces hold at most
/// `chunk` characters, and a piece never contains `%s`, which `input text`
/// would turn into a space.
fn plan_text_input(text: &str, chunk: usize) -> DeviceResult<Vec<TextInput>> {
    let chunk = chunk.max(1);
    let mut inputs = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let key = match c {
            '\r' => {
                chars.next_if_eq(&'\n');
                Some(KeyCode::Enter)
            }
            '\n' => Some(KeyCode::Enter),
            '\t' => Some(KeyCode::Tab),
            c if c.is_control() => {
                return Err(DeviceError::InvalidInput {
                    param: params::TEXT,
                    reason: format!("control character U+{:04X} cannot be typed", c as u32),
                })
            }
            _ => None,
        };

        let split_here = key.is_some()
            || piece_len == chunk
            || (c == 's' && piece.ends_with('%'));
        if split_here && !piece.is_empty() {
            inputs.push(TextInput::Text(std::mem::take(&mut piece)));
            piece_len = 0;
        }

        match key {
            Some(key) => inputs.push(TextInput::Key(key)),
            None => {
                piece.push(c);
                piece_len += 1;
            }
        }
    }

    if !piece.is_empty() {
        inputs.push(TextInput::Text(piece));
    }
    Ok(inputs)
}

/// Encode text for `input text`: spaces become `%s`, characters the device
/// shell would interpret are backslash-escaped
fn encode_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '\\' | '\'' | '"' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '[' | ']'
            | '{' | '}' | '*' | '~' | '!' | '?' | '#' | '%' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
