//! Input events as the host hands them to the canvas.
//!
//! Window toolkits differ in how they describe pointer and keyboard input, so the
//! host normalizes everything to these types before calling into the canvas.
//! Pointer positions are always in window coordinates.

use glam::Vec2;
use strum_macros::{Display, EnumIter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Keyboard modifiers and held mouse buttons at the time of an event
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    /// The platform "command" key (Cmd on macOS, the Windows key elsewhere)
    pub command: bool,
    pub left_button: bool,
    pub middle_button: bool,
    pub right_button: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn control() -> Self {
        Self {
            control: true,
            ..Self::default()
        }
    }

    /// Same modifiers with `button` marked as held
    pub fn with_button(self, button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Self {
                left_button: true,
                ..self
            },
            MouseButton::Middle => Self {
                middle_button: true,
                ..self
            },
            MouseButton::Right => Self {
                right_button: true,
                ..self
            },
        }
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.left_button,
            MouseButton::Middle => self.middle_button,
            MouseButton::Right => self.right_button,
        }
    }

    /// Shift or control, the modifiers that extend a selection instead of replacing it
    pub fn extends_selection(&self) -> bool {
        self.shift || self.control || self.command
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum KeyCode {
    Char(char),
    Escape,
    Return,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Shift,
    Control,
    Alt,
    Command,
    Function(u8),
    /// Raw platform keycode the host could not map
    Other(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: KeyCode,
    /// Text produced by the key press, empty for non-printing keys
    pub text: String,
}

impl KeyInfo {
    pub fn new(key: KeyCode) -> Self {
        let text = match &key {
            KeyCode::Char(c) => c.to_string(),
            _ => String::new(),
        };
        Self { key, text }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ButtonEvent {
    pub button: MouseButton,
    pub press: bool,
    pub position: Vec2,
    pub modifiers: Modifiers,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MotionEvent {
    pub position: Vec2,
    pub modifiers: Modifiers,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyEvent {
    pub key: KeyInfo,
    pub press: bool,
    pub modifiers: Modifiers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_with_button_marks_only_that_button() {
        for button in MouseButton::iter() {
            let modifiers = Modifiers::shift().with_button(button);
            assert!(modifiers.shift);
            for other in MouseButton::iter() {
                assert_eq!(modifiers.is_button_held(other), other == button);
            }
        }
    }

    #[test]
    fn test_key_info_text() {
        assert_eq!(KeyInfo::new(KeyCode::Char('a')).text, "a");
        assert!(KeyInfo::new(KeyCode::Delete).text.is_empty());
        assert_eq!(KeyCode::Escape.to_string(), "Escape");
    }
}
