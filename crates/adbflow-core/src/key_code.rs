//! Symbolic key codes for the press action

use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hardware/soft keys a press action can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Back,
    Home,
    /// Recent apps; the navigation bar "menu" button
    AppSwitch,
    Enter,
    Tab,
    Delete,
    Escape,
    Power,
    VolumeUp,
    VolumeDown,
    Search,
    Camera,
}

impl KeyCode {
    /// All supported keys
    pub const ALL: [KeyCode; 12] = [
        KeyCode::Back,
        KeyCode::Home,
        KeyCode::AppSwitch,
        KeyCode::Enter,
        KeyCode::Tab,
        KeyCode::Delete,
        KeyCode::Escape,
        KeyCode::Power,
        KeyCode::VolumeUp,
        KeyCode::VolumeDown,
        KeyCode::Search,
        KeyCode::Camera,
    ];

    /// Android `KEYCODE_*` value
    pub fn android_code(self) -> u32 {
        match self {
            KeyCode::Back => 4,
            KeyCode::Home => 3,
            KeyCode::AppSwitch => 187,
            KeyCode::Enter => 66,
            KeyCode::Tab => 61,
            KeyCode::Delete => 67,
            KeyCode::Escape => 111,
            KeyCode::Power => 26,
            KeyCode::VolumeUp => 24,
            KeyCode::VolumeDown => 25,
            KeyCode::Search => 84,
            KeyCode::Camera => 27,
        }
    }

    /// Canonical symbolic name
    pub fn name(self) -> &'static str {
        match self {
            KeyCode::Back => "back",
            KeyCode::Home => "home",
            KeyCode::AppSwitch => "app_switch",
            KeyCode::Enter => "enter",
            KeyCode::Tab => "tab",
            KeyCode::Delete => "delete",
            KeyCode::Escape => "escape",
            KeyCode::Power => "power",
            KeyCode::VolumeUp => "volume_up",
            KeyCode::VolumeDown => "volume_down",
            KeyCode::Search => "search",
            KeyCode::Camera => "camera",
        }
    }
}

impl FromStr for KeyCode {
    type Err = ActionError;

    /// Accepts symbolic names (`back`, `KEYCODE_BACK`, `menu`) and the
    /// numeric Android code of a supported key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let normalized = lowered.strip_prefix("keycode_").unwrap_or(lowered.as_str());

        if let Ok(code) = normalized.parse::<u32>() {
            return KeyCode::ALL
                .into_iter()
                .find(|k| k.android_code() == code)
                .ok_or_else(|| ActionError::UnknownKeyCode(s.to_string()));
        }

        let key = match normalized {
            "back" => KeyCode::Back,
            "home" => KeyCode::Home,
            "menu" | "app_switch" | "recents" => KeyCode::AppSwitch,
            "enter" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "delete" | "del" | "backspace" => KeyCode::Delete,
            "escape" | "esc" => KeyCode::Escape,
            "power" => KeyCode::Power,
            "volume_up" => KeyCode::VolumeUp,
            "volume_down" => KeyCode::VolumeDown,
            "search" => KeyCode::Search,
            "camera" => KeyCode::Camera,
            _ => return Err(ActionError::UnknownKeyCode(s.to_string())),
        };
        Ok(key)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
