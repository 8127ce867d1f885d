// Promptdock Chord Parser
// "ctrl+shift+p" style strings into modifier/key structures

use smallvec::SmallVec;

/// Modifier half of a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordMod {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

/// Non-modifier half of a chord, or a standalone tapped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKey {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    Space,
    F(u8),
}

/// A parsed key chord: zero or more modifiers plus one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    pub modifiers: SmallVec<[ChordMod; 4]>,
    pub key: ChordKey,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChordParseError {
    #[error("empty chord string")]
    Empty,

    #[error("unknown key token '{0}'")]
    UnknownKey(String),

    #[error("chord '{0}' has modifiers but no key")]
    MissingKey(String),
}

impl ChordMod {
    /// Parse a single modifier name, with the same aliases the chord
    /// parser accepts.
    pub fn parse(token: &str) -> Option<Self> {
        parse_modifier(token)
    }
}

impl Chord {
    /// Parse a chord string. Tokens are separated by `+`; every token
    /// but the last must be a modifier. Case-insensitive.
    pub fn parse(input: &str) -> Result<Self, ChordParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ChordParseError::Empty);
        }

        let tokens: Vec<&str> = trimmed.split('+').map(str::trim).collect();
        let mut modifiers = SmallVec::new();
        let (key_token, mod_tokens) = tokens.split_last().expect("split on non-empty input");

        for token in mod_tokens {
            let modifier = parse_modifier(token)
                .ok_or_else(|| ChordParseError::UnknownKey((*token).to_string()))?;
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
        }

        // A trailing modifier token means the chord has no key.
        if parse_modifier(key_token).is_some() {
            return Err(ChordParseError::MissingKey(trimmed.to_string()));
        }

        let key = parse_key(key_token)
            .ok_or_else(|| ChordParseError::UnknownKey((*key_token).to_string()))?;
        Ok(Self { modifiers, key })
    }
}

fn parse_modifier(token: &str) -> Option<ChordMod> {
    match token.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(ChordMod::Ctrl),
        "shift" => Some(ChordMod::Shift),
        "alt" => Some(ChordMod::Alt),
        "meta" | "super" | "win" | "cmd" => Some(ChordMod::Meta),
        _ => None,
    }
}

fn parse_key(token: &str) -> Option<ChordKey> {
    let lower = token.to_ascii_lowercase();
    match lower.as_str() {
        "enter" | "return" => return Some(ChordKey::Enter),
        "esc" | "escape" => return Some(ChordKey::Escape),
        "backspace" => return Some(ChordKey::Backspace),
        "del" | "delete" => return Some(ChordKey::Delete),
        "tab" => return Some(ChordKey::Tab),
        "space" => return Some(ChordKey::Space),
        _ => {}
    }
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) {
            return Some(ChordKey::F(n));
        }
    }
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(ChordKey::Char(c.to_ascii_lowercase())),
        _ => None,
    }
}
