// Promptdock Input Synthesis
// Pointer/keyboard/clipboard output behind a trait; native impl uses enigo + arboard

use crate::geometry::Point;
use crate::inject::chord::{Chord, ChordKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
}

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("input synthesis failed: {0}")]
    Backend(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
}

/// Synthesized pointer and keyboard output.
///
/// Everything the sequencer does to the outside world at send time
/// goes through this trait, so tests can assert the exact synthetic
/// event sequence (including its absence).
pub trait InputSynth {
    /// Current pointer position. A read, not a synthetic event.
    fn pointer_position(&mut self) -> Result<Point, SynthError>;

    fn move_pointer(&mut self, to: Point) -> Result<(), SynthError>;

    fn click(&mut self, button: PointerButton) -> Result<(), SynthError>;

    /// Press and release a single key.
    fn tap(&mut self, key: ChordKey) -> Result<(), SynthError>;

    /// Hold the chord's modifiers, tap its key, release the modifiers.
    fn chord(&mut self, chord: &Chord) -> Result<(), SynthError>;

    /// Place payload text on the system clipboard.
    fn set_clipboard(&mut self, text: &str) -> Result<(), SynthError>;
}

#[cfg(feature = "native-backends")]
pub use native::EnigoSynth;

#[cfg(feature = "native-backends")]
mod native {
    use super::*;
    use crate::inject::chord::ChordMod;
    use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

    /// Native synthesis via enigo, clipboard via arboard.
    pub struct EnigoSynth {
        enigo: Enigo,
        clipboard: arboard::Clipboard,
    }

    impl EnigoSynth {
        pub fn new() -> Result<Self, SynthError> {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| SynthError::Backend(e.to_string()))?;
            let clipboard =
                arboard::Clipboard::new().map_err(|e| SynthError::Clipboard(e.to_string()))?;
            Ok(Self { enigo, clipboard })
        }

        fn enigo_key(key: ChordKey) -> Result<enigo::Key, SynthError> {
            let mapped = match key {
                ChordKey::Char(c) => enigo::Key::Unicode(c),
                ChordKey::Enter => enigo::Key::Return,
                ChordKey::Escape => enigo::Key::Escape,
                ChordKey::Backspace => enigo::Key::Backspace,
                ChordKey::Delete => enigo::Key::Delete,
                ChordKey::Tab => enigo::Key::Tab,
                ChordKey::Space => enigo::Key::Space,
                ChordKey::F(n) => match n {
                    1 => enigo::Key::F1,
                    2 => enigo::Key::F2,
                    3 => enigo::Key::F3,
                    4 => enigo::Key::F4,
                    5 => enigo::Key::F5,
                    6 => enigo::Key::F6,
                    7 => enigo::Key::F7,
                    8 => enigo::Key::F8,
                    9 => enigo::Key::F9,
                    10 => enigo::Key::F10,
                    11 => enigo::Key::F11,
                    12 => enigo::Key::F12,
                    other => {
                        return Err(SynthError::UnsupportedKey(format!("f{}", other)));
                    }
                },
            };
            Ok(mapped)
        }

        fn enigo_modifier(modifier: ChordMod) -> enigo::Key {
            match modifier {
                ChordMod::Ctrl => enigo::Key::Control,
                ChordMod::Shift => enigo::Key::Shift,
                ChordMod::Alt => enigo::Key::Alt,
                ChordMod::Meta => enigo::Key::Meta,
            }
        }
    }

    impl InputSynth for EnigoSynth {
        fn pointer_position(&mut self) -> Result<Point, SynthError> {
            let (x, y) = self
                .enigo
                .location()
                .map_err(|e| SynthError::Backend(e.to_string()))?;
            Ok(Point::new(x, y))
        }

        fn move_pointer(&mut self, to: Point) -> Result<(), SynthError> {
            self.enigo
                .move_mouse(to.x, to.y, Coordinate::Abs)
                .map_err(|e| SynthError::Backend(e.to_string()))
        }

        fn click(&mut self, button: PointerButton) -> Result<(), SynthError> {
            let button = match button {
                PointerButton::Left => Button::Left,
                PointerButton::Right => Button::Right,
            };
            self.enigo
                .button(button, Direction::Click)
                .map_err(|e| SynthError::Backend(e.to_string()))
        }

        fn tap(&mut self, key: ChordKey) -> Result<(), SynthError> {
            self.enigo
                .key(Self::enigo_key(key)?, Direction::Click)
                .map_err(|e| SynthError::Backend(e.to_string()))
        }

        fn chord(&mut self, chord: &Chord) -> Result<(), SynthError> {
            for modifier in &chord.modifiers {
                self.enigo
                    .key(Self::enigo_modifier(*modifier), Direction::Press)
                    .map_err(|e| SynthError::Backend(e.to_string()))?;
            }
            let result = self
                .enigo
                .key(Self::enigo_key(chord.key)?, Direction::Click)
                .map_err(|e| SynthError::Backend(e.to_string()));
            // Always release what was pressed, even if the tap failed.
            for modifier in chord.modifiers.iter().rev() {
                let _ = self
                    .enigo
                    .key(Self::enigo_modifier(*modifier), Direction::Release);
            }
            result
        }

        fn set_clipboard(&mut self, text: &str) -> Result<(), SynthError> {
            self.clipboard
                .set_text(text)
                .map_err(|e| SynthError::Clipboard(e.to_string()))
        }
    }
}
