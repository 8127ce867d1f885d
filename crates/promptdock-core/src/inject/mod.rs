//! Injection
//!
//! Chord parsing, input synthesis, and the sequencer that drives one
//! send operation from window resolution to payload delivery.

pub mod chord;
pub mod sequencer;
pub mod synth;

pub use chord::{Chord, ChordKey, ChordMod, ChordParseError};
pub use sequencer::{InjectionSequencer, SendError};
pub use synth::{InputSynth, PointerButton, SynthError};

#[cfg(feature = "native-backends")]
pub use synth::EnigoSynth;

/// What a send operation delivers once the target input has focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Pasted through the clipboard.
    Text(String),
    /// A single key chord, e.g. to trigger a command palette.
    Chord(Chord),
}

/// Per-send delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Press Enter after delivering the payload.
    pub auto_submit: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { auto_submit: true }
    }
}
