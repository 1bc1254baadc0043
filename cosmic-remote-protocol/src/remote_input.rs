//! Remote input commands
//!
//! Closed vocabulary of keyboard, pointer, gamepad, media and system inputs
//! sent to the connected device. Commands are forwarded opaquely to a
//! [`CommandSink`]; encoding them on the wire is the sink's job.
//!
//! ```rust
//! use cosmic_remote_protocol::remote_input::{KeyCode, RemoteCommand};
//!
//! let copy = RemoteCommand::KeyCombination(vec![KeyCode::Control, KeyCode::C]);
//! let json = serde_json::to_string(&copy).unwrap();
//! assert_eq!(json, r#"{"key_combination":["control","c"]}"#);
//! ```

use crate::session::SessionManager;
use crate::{ProtocolError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Keyboard keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Return,
    Space,
    Tab,
    Delete,
    Escape,
    Command,
    Option,
    Control,
    Shift,
    UpArrow,
    DownArrow,
    LeftArrow,
    RightArrow,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl KeyCode {
    /// Function key `F<number>` for `number` in `1..=12`
    pub fn function(number: u8) -> Option<KeyCode> {
        const KEYS: [KeyCode; 12] = [
            KeyCode::F1,
            KeyCode::F2,
            KeyCode::F3,
            KeyCode::F4,
            KeyCode::F5,
            KeyCode::F6,
            KeyCode::F7,
            KeyCode::F8,
            KeyCode::F9,
            KeyCode::F10,
            KeyCode::F11,
            KeyCode::F12,
        ];
        number
            .checked_sub(1)
            .and_then(|index| KEYS.get(usize::from(index)))
            .copied()
    }

    /// Letter key for an ASCII letter
    pub fn letter(c: char) -> Option<KeyCode> {
        const LETTERS: [KeyCode; 26] = [
            KeyCode::A,
            KeyCode::B,
            KeyCode::C,
            KeyCode::D,
            KeyCode::E,
            KeyCode::F,
            KeyCode::G,
            KeyCode::H,
            KeyCode::I,
            KeyCode::J,
            KeyCode::K,
            KeyCode::L,
            KeyCode::M,
            KeyCode::N,
            KeyCode::O,
            KeyCode::P,
            KeyCode::Q,
            KeyCode::R,
            KeyCode::S,
            KeyCode::T,
            KeyCode::U,
            KeyCode::V,
            KeyCode::W,
            KeyCode::X,
            KeyCode::Y,
            KeyCode::Z,
        ];
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let index = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        LETTERS.get(index).copied()
    }

    /// Whether the key is a modifier
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::Command | KeyCode::Option | KeyCode::Control | KeyCode::Shift
        )
    }
}

/// Gamepad buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    L1,
    L2,
    R1,
    R2,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Start,
    Select,
}

/// Media playback controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaControl {
    PlayPause,
    Next,
    Previous,
    Stop,
    VolumeUp,
    VolumeDown,
    Mute,
    Shuffle,
    Repeat,
}

/// Touchpad pointer actions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Move { dx: f64, dy: f64 },
    LeftClick,
    RightClick,
    DoubleClick,
    MiddleClick,
    ScrollUp,
    ScrollDown,
}

/// Device navigation buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationButton {
    Home,
    Back,
    Multitasking,
}

/// Device-wide actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAction {
    LockScreen,
    Screenshot,
    ToggleRotationLock,
    VolumeUp,
    VolumeDown,
    MuteToggle,
    PowerDialog,
    MediaAppSelector,
}

/// One input sent to the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCommand {
    Key(KeyCode),
    KeyCombination(Vec<KeyCode>),
    Text(String),
    Pointer(PointerAction),
    Gamepad(GamepadButton),
    Media(MediaControl),
    /// Device volume in `[0.0, 1.0]`
    SetVolume(f64),
    Navigation(NavigationButton),
    System(SystemAction),
    /// Launch an application by identifier
    LaunchApp(String),
}

/// Delivers commands to the connected device
#[async_trait]
pub trait CommandSink: Send + Sync + Debug {
    async fn send(&self, command: &RemoteCommand) -> Result<()>;
}

/// Sends input to the device of the current session
#[derive(Debug, Clone)]
pub struct RemoteControl {
    session: SessionManager,
    sink: Arc<dyn CommandSink>,
}

impl RemoteControl {
    pub fn new(session: SessionManager, sink: Arc<dyn CommandSink>) -> Self {
        Self { session, sink }
    }

    /// Forward `command` to the sink
    ///
    /// Fails with [`ProtocolError::NotConnected`] unless the session is
    /// connected. Volumes are clamped to `[0.0, 1.0]`.
    pub async fn send(&self, command: RemoteCommand) -> Result<()> {
        if !self.session.is_connected() {
            return Err(ProtocolError::NotConnected);
        }

        let command = match command {
            RemoteCommand::KeyCombination(keys) if keys.is_empty() => {
                return Err(ProtocolError::invalid_state("empty key combination"));
            }
            RemoteCommand::LaunchApp(app) if app.trim().is_empty() => {
                return Err(ProtocolError::invalid_state("empty application id"));
            }
            RemoteCommand::SetVolume(volume) if volume.is_nan() => {
                return Err(ProtocolError::invalid_state("volume is not a number"));
            }
            RemoteCommand::SetVolume(volume) => RemoteCommand::SetVolume(volume.clamp(0.0, 1.0)),
            other => other,
        };

        debug!("Sending remote command {:?}", command);
        self.sink.send(&command).await
    }

    /// Press a single key
    pub async fn send_key(&self, key: KeyCode) -> Result<()> {
        self.send(RemoteCommand::Key(key)).await
    }

    /// Type `text`; empty text is not sent
    pub async fn send_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.send(RemoteCommand::Text(text.to_string())).await
    }

    /// Press function key `F<number>`
    pub async fn send_function_key(&self, number: u8) -> Result<()> {
        let key = KeyCode::function(number).ok_or_else(|| {
            ProtocolError::invalid_state(format!("F{} is not a function key", number))
        })?;
        self.send_key(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_keys() {
        assert_eq!(KeyCode::function(1), Some(KeyCode::F1));
        assert_eq!(KeyCode::function(12), Some(KeyCode::F12));
        assert_eq!(KeyCode::function(0), None);
        assert_eq!(KeyCode::function(13), None);
    }

    #[test]
    fn test_letters() {
        assert_eq!(KeyCode::letter('a'), Some(KeyCode::A));
        assert_eq!(KeyCode::letter('Z'), Some(KeyCode::Z));
        assert_eq!(KeyCode::letter('1'), None);
        assert_eq!(KeyCode::letter('é'), None);
    }

    #[test]
    fn test_modifiers() {
        assert!(KeyCode::Shift.is_modifier());
        assert!(!KeyCode::Tab.is_modifier());
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_string(&RemoteCommand::Gamepad(GamepadButton::DpadUp)).unwrap();
        assert_eq!(json, r#"{"gamepad":"dpad_up"}"#);

        let json = serde_json::to_string(&RemoteCommand::Pointer(PointerAction::Move {
            dx: 1.5,
            dy: -2.0,
        }))
        .unwrap();
        assert_eq!(json, r#"{"pointer":{"move":{"dx":1.5,"dy":-2.0}}}"#);

        let parsed: RemoteCommand = serde_json::from_str(r#"{"media":"play_pause"}"#).unwrap();
        assert_eq!(parsed, RemoteCommand::Media(MediaControl::PlayPause));
    }
}
