// Promptdock Hotkey Filter
// Pure reclassification of key events; no device access

use crate::inject::ChordMod;
use smallvec::SmallVec;

/// Linux input event key codes used by the filter.
pub mod codes {
    pub const KEY_ESC: u16 = 1;
    pub const KEY_LEFTCTRL: u16 = 29;
    pub const KEY_LEFTSHIFT: u16 = 42;
    pub const KEY_RIGHTSHIFT: u16 = 54;
    pub const KEY_LEFTALT: u16 = 56;
    pub const KEY_LEFTMETA: u16 = 125;
    pub const KEY_RIGHTMETA: u16 = 126;
    pub const KEY_RIGHTCTRL: u16 = 97;
    pub const KEY_RIGHTALT: u16 = 100;
    /// Phantom key for breaking the OS combo tracker. Unbound on
    /// stock layouts.
    pub const KEY_F24: u16 = 194;
}

/// One key event as seen by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub pressed: bool,
    /// Set when the event came from this tool's own virtual device.
    /// Such events are replayed output and must never be reclassified.
    pub from_virtual: bool,
}

/// Live key state, queried explicitly rather than reconstructed from
/// a single event's modifier bits.
pub trait KeyStateQuery {
    fn is_held(&self, code: u16) -> bool;
}

/// One synthesized output step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStep {
    Press(u16),
    Release(u16),
    Tap(u16),
}

/// What the interceptor does with one key-down event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Re-emit the event unchanged.
    PassThrough,
    /// Swallow the event; synthesize `sequence` so the original
    /// system-level action fires with the override modifier out of
    /// the way.
    ForwardOriginal { sequence: SmallVec<[KeyStep; 8]> },
    /// Swallow the event; synthesize `cancel` to defuse the OS combo
    /// tracker, then run the alternate action asynchronously.
    Redirect { cancel: SmallVec<[KeyStep; 8]> },
}

/// Interceptor configuration resolved from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookConfig {
    /// Key code of the monitored trigger key.
    pub trigger: u16,
    /// Modifier that must be held for the combination to match.
    pub primary: ChordMod,
    /// Modifier that, when additionally held, forces the original
    /// system action instead of the redirect.
    pub override_modifier: ChordMod,
    pub redirect_enabled: bool,
}

impl HookConfig {
    /// The configuration the device loop classifies with.
    ///
    /// At event time, redirect enablement is owned by the engine's
    /// shared flag; the value parsed from settings only seeds that
    /// flag. The loop therefore classifies with redirects armed and
    /// gates each event on the flag, so enabling redirects after
    /// startup takes effect.
    pub fn armed(self) -> Self {
        Self {
            redirect_enabled: true,
            ..self
        }
    }
}

/// Left/right key codes for a modifier.
pub fn modifier_codes(modifier: ChordMod) -> &'static [u16] {
    use codes::*;
    match modifier {
        ChordMod::Ctrl => &[KEY_LEFTCTRL, KEY_RIGHTCTRL],
        ChordMod::Shift => &[KEY_LEFTSHIFT, KEY_RIGHTSHIFT],
        ChordMod::Alt => &[KEY_LEFTALT, KEY_RIGHTALT],
        ChordMod::Meta => &[KEY_LEFTMETA, KEY_RIGHTMETA],
    }
}

/// Key code for a single-letter trigger name, or None for names the
/// interceptor does not monitor.
pub fn trigger_code(name: &str) -> Option<u16> {
    // Evdev codes for the letter rows.
    const ROWS: &[(&str, u16)] = &[("qwertyuiop", 16), ("asdfghjkl", 30), ("zxcvbnm", 44)];
    let mut chars = name.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let c = c.to_ascii_lowercase();
    for (row, base) in ROWS {
        if let Some(pos) = row.find(c) {
            return Some(base + pos as u16);
        }
    }
    None
}

fn any_held(held: &dyn KeyStateQuery, codes: &[u16]) -> bool {
    codes.iter().any(|c| held.is_held(*c))
}

/// Classify one key event against the hotkey configuration.
///
/// Only key-down events of the trigger key are ever reclassified;
/// everything else, including this tool's own replayed output, passes
/// through unchanged.
pub fn classify(event: KeyEvent, held: &dyn KeyStateQuery, cfg: &HookConfig) -> HookDecision {
    if event.from_virtual || !event.pressed || event.code != cfg.trigger {
        return HookDecision::PassThrough;
    }

    let primary = modifier_codes(cfg.primary);
    if !any_held(held, primary) {
        return HookDecision::PassThrough;
    }

    let held_overrides: SmallVec<[u16; 2]> = modifier_codes(cfg.override_modifier)
        .iter()
        .copied()
        .filter(|c| held.is_held(*c))
        .collect();

    if !held_overrides.is_empty() {
        // Replay the trigger with the override out of the way, then
        // put the override back. The primary stays logically held.
        let mut sequence = SmallVec::new();
        for code in &held_overrides {
            sequence.push(KeyStep::Release(*code));
        }
        sequence.push(KeyStep::Tap(cfg.trigger));
        for code in &held_overrides {
            sequence.push(KeyStep::Press(*code));
        }
        return HookDecision::ForwardOriginal { sequence };
    }

    if cfg.redirect_enabled {
        // A phantom tap plus releasing the held primaries plus an
        // escape tap stops the OS's own combo tracking from firing
        // its default action.
        let mut cancel = SmallVec::new();
        cancel.push(KeyStep::Tap(codes::KEY_F24));
        for code in primary.iter().copied().filter(|c| held.is_held(*c)) {
            cancel.push(KeyStep::Release(code));
        }
        cancel.push(KeyStep::Tap(codes::KEY_ESC));
        return HookDecision::Redirect { cancel };
    }

    HookDecision::PassThrough
}
