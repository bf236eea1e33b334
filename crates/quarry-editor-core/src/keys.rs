//! Platform-agnostic key representation and the history chords.
//!
//! Hosts convert their native key events into these types before handing
//! them to the core.

use smol_str::SmolStr;

/// Key values relevant to the history engine and selection subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character key.
    Character(SmolStr),

    /// Unknown/unidentified key.
    Unidentified,

    // === Whitespace / editing ===
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,

    // === Navigation ===
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,

    // === Modifiers ===
    Alt,
    CapsLock,
    Control,
    Meta,
    Shift,
}

impl Key {
    /// Create a character key.
    pub fn character(s: impl Into<SmolStr>) -> Self {
        Self::Character(s.into())
    }

    /// The single character of a character key, when it is one.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Character(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::ArrowLeft
                | Self::ArrowRight
                | Self::ArrowUp
                | Self::ArrowDown
                | Self::Home
                | Self::End
                | Self::PageUp
                | Self::PageDown
        )
    }

    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Self::Alt | Self::CapsLock | Self::Control | Self::Meta | Self::Shift
        )
    }
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        ctrl: false,
        alt: false,
        shift: true,
        meta: false,
    };

    pub const META: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: true,
    };

    pub const CTRL_SHIFT: Self = Self {
        ctrl: true,
        alt: false,
        shift: true,
        meta: false,
    };

    pub const META_SHIFT: Self = Self {
        ctrl: false,
        alt: false,
        shift: true,
        meta: true,
    };

    /// The platform's primary modifier (Cmd on Mac, Ctrl elsewhere).
    pub fn primary(is_mac: bool) -> Self {
        if is_mac { Self::META } else { Self::CTRL }
    }

    pub fn primary_shift(is_mac: bool) -> Self {
        if is_mac {
            Self::META_SHIFT
        } else {
            Self::CTRL_SHIFT
        }
    }

    /// True when Ctrl or Meta is held.
    pub fn has_command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A key combination for triggering an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn matches(&self, key: &Key, modifiers: Modifiers) -> bool {
        &self.key == key && self.modifiers == modifiers
    }
}

/// The three history chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChord {
    /// Primary undo: Cmd/Ctrl+Z.
    Undo,
    /// Shift redo: Cmd/Ctrl+Shift+Z.
    RedoShift,
    /// Windows-style redo: Cmd/Ctrl+Y.
    RedoY,
}

impl HistoryChord {
    pub fn combo(self, is_mac: bool) -> KeyCombo {
        match self {
            Self::Undo => KeyCombo::with_modifiers(Key::character("z"), Modifiers::primary(is_mac)),
            Self::RedoShift => {
                KeyCombo::with_modifiers(Key::character("z"), Modifiers::primary_shift(is_mac))
            }
            Self::RedoY => KeyCombo::with_modifiers(Key::character("y"), Modifiers::primary(is_mac)),
        }
    }

    pub const ALL: [Self; 3] = [Self::Undo, Self::RedoShift, Self::RedoY];

    /// Which chord, if any, a key event matches.
    pub fn from_event(key: &Key, modifiers: Modifiers, is_mac: bool) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|chord| chord.combo(is_mac).matches(key, modifiers))
    }
}
