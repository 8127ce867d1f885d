//! Hotkey interception
//!
//! A global keyboard filter that reclassifies one trigger combination
//! and redirects or passes it through. The decision core is pure and
//! device-free; the runtime owns the device grab on its own thread.

pub mod filter;
#[cfg(feature = "native-backends")]
pub mod runtime;

pub use filter::{
    classify, codes, modifier_codes, trigger_code, HookConfig, HookDecision, KeyEvent,
    KeyStateQuery, KeyStep,
};
#[cfg(feature = "native-backends")]
pub use runtime::{HookError, HotkeyInterceptor, RedirectRequest};

use crate::inject::ChordMod;
use crate::settings::HotkeySettings;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookConfigError {
    #[error("unsupported trigger key '{0}'")]
    UnknownTrigger(String),

    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
}

impl HookConfig {
    /// Resolve key and modifier names from the settings file into
    /// event codes.
    pub fn from_settings(hotkey: &HotkeySettings) -> Result<Self, HookConfigError> {
        let trigger = trigger_code(&hotkey.trigger)
            .ok_or_else(|| HookConfigError::UnknownTrigger(hotkey.trigger.clone()))?;
        let primary = ChordMod::parse(&hotkey.primary_modifier)
            .ok_or_else(|| HookConfigError::UnknownModifier(hotkey.primary_modifier.clone()))?;
        let override_modifier = ChordMod::parse(&hotkey.override_modifier)
            .ok_or_else(|| HookConfigError::UnknownModifier(hotkey.override_modifier.clone()))?;
        Ok(Self {
            trigger,
            primary,
            override_modifier,
            redirect_enabled: hotkey.redirect_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_default_settings() {
        let cfg = HookConfig::from_settings(&HotkeySettings::default()).unwrap();
        assert_eq!(cfg.trigger, 47); // KEY_V
        assert_eq!(cfg.primary, ChordMod::Meta);
        assert_eq!(cfg.override_modifier, ChordMod::Shift);
        assert!(!cfg.redirect_enabled);
    }

    #[test]
    fn test_config_rejects_unknown_names() {
        let mut hotkey = HotkeySettings::default();
        hotkey.trigger = "volumeup".to_string();
        assert_eq!(
            HookConfig::from_settings(&hotkey),
            Err(HookConfigError::UnknownTrigger("volumeup".to_string()))
        );

        let mut hotkey = HotkeySettings::default();
        hotkey.primary_modifier = "hyper".to_string();
        assert!(matches!(
            HookConfig::from_settings(&hotkey),
            Err(HookConfigError::UnknownModifier(_))
        ));
    }
}
