//! Keyboard controls

/// Keys the player reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Char(char),
}

/// A keypress as delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    /// True while a text input owns focus; such keypresses are ignored
    pub text_input_focused: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            text_input_focused: false,
        }
    }

    pub fn in_text_input(key: Key) -> Self {
        Self {
            key,
            text_input_focused: true,
        }
    }
}

/// Keyboard/remote control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    TogglePlay,
    ToggleMute,
    ToggleFullscreen,
    SeekBackward,
    SeekForward,
    VolumeUp,
    VolumeDown,
    RateUp,
    RateDown,
}

impl ControlAction {
    pub fn from_key(input: KeyInput) -> Option<Self> {
        if input.text_input_focused {
            return None;
        }
        let action = match input.key {
            Key::Space => ControlAction::TogglePlay,
            Key::ArrowLeft => ControlAction::SeekBackward,
            Key::ArrowRight => ControlAction::SeekForward,
            Key::ArrowUp => ControlAction::VolumeUp,
            Key::ArrowDown => ControlAction::VolumeDown,
            Key::Char(c) => match c.to_ascii_lowercase() {
                'k' | ' ' => ControlAction::TogglePlay,
                'm' => ControlAction::ToggleMute,
                'f' => ControlAction::ToggleFullscreen,
                '>' | '.' => ControlAction::RateUp,
                '<' | ',' => ControlAction::RateDown,
                _ => return None,
            },
        };
        Some(action)
    }
}
