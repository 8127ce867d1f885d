// Promptdock Core Library
// Screen-anchor calibration and text injection into host application windows

pub mod anchor;
pub mod calibration;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hook;
pub mod inject;
pub mod settings;
pub mod target;
pub mod window;

pub use anchor::{AnchorLocator, AnchorMatch, BufferScreenSource, LocateError, ScreenSource};
pub use calibration::{
    CalibrationError, CalibrationEvent, CalibrationPhase, CalibrationProgress, CalibrationRecord,
    CalibrationSession, CalibrationStore, StoreError,
};
pub use engine::{BackendFactory, Engine, EngineError, Notification};
pub use error::ErrorKind;
pub use geometry::{Point, Rect};
pub use hook::{classify, HookConfig, HookDecision, KeyEvent, KeyStateQuery, KeyStep};
pub use inject::{
    Chord, ChordKey, ChordMod, InjectionSequencer, InputSynth, Payload, PointerButton, SendError,
    SendOptions, SynthError,
};
pub use settings::{Settings, SettingsError};
pub use target::{ContainerKind, ContainerSpec, Target};
pub use window::{BackendError, ResolveError, WindowBackend, WindowInfo, WindowResolver};

#[cfg(feature = "native-backends")]
pub use anchor::XcapScreenSource;
#[cfg(feature = "native-backends")]
pub use hook::{HotkeyInterceptor, RedirectRequest};
#[cfg(feature = "native-backends")]
pub use inject::EnigoSynth;
#[cfg(feature = "native-backends")]
pub use window::X11WindowBackend;
