// Promptdock Window Backend
// OS window enumeration and activation behind a trait

use crate::geometry::Rect;

/// Error type for window backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not connected to a display server")]
    NotConnected,

    #[error("window {0} no longer exists")]
    Gone(u64),

    #[error("window query failed: {0}")]
    QueryFailed(String),
}

/// Snapshot of one top-level window at enumeration time.
///
/// Handles are ephemeral: the underlying window may close or move at
/// any moment, so a `WindowInfo` is only valid for the single
/// resolve/activate/inject operation that produced it and is never
/// cached across operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Backend-specific window handle.
    pub id: u64,
    /// Window class (WM_CLASS class component on X11).
    pub class: String,
    /// Window title.
    pub title: String,
    /// Owning process id, 0 when the window manager does not report one.
    pub pid: u32,
    /// Absolute screen geometry.
    pub rect: Rect,
    pub visible: bool,
    pub minimized: bool,
}

/// Trait for window system backends.
///
/// Implementations enumerate live top-level windows and manipulate
/// their stacking/activation state. Tests use a scripted fake.
pub trait WindowBackend {
    /// Enumerate all current top-level windows in the window system's
    /// own order. That order is not guaranteed stable between calls.
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>, BackendError>;

    /// Restore the window if minimized and bring it to the foreground.
    fn activate(&mut self, id: u64) -> Result<(), BackendError>;

    /// Pin the window above all others, or release it.
    fn set_topmost(&mut self, id: u64, topmost: bool) -> Result<(), BackendError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// Scripted backend replaying a fixed enumeration and recording
    /// activation calls.
    #[derive(Debug, Default)]
    pub struct ScriptedWindows {
        pub windows: Vec<WindowInfo>,
        pub activated: Vec<u64>,
        pub topmost_calls: Vec<(u64, bool)>,
    }

    impl ScriptedWindows {
        pub fn new(windows: Vec<WindowInfo>) -> Self {
            Self {
                windows,
                activated: Vec::new(),
                topmost_calls: Vec::new(),
            }
        }
    }

    impl WindowBackend for ScriptedWindows {
        fn list_windows(&mut self) -> Result<Vec<WindowInfo>, BackendError> {
            Ok(self.windows.clone())
        }

        fn activate(&mut self, id: u64) -> Result<(), BackendError> {
            if !self.windows.iter().any(|w| w.id == id) {
                return Err(BackendError::Gone(id));
            }
            self.activated.push(id);
            Ok(())
        }

        fn set_topmost(&mut self, id: u64, topmost: bool) -> Result<(), BackendError> {
            self.topmost_calls.push((id, topmost));
            Ok(())
        }
    }
}
