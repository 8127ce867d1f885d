// Promptdock Error Taxonomy
// Stable error kinds reported at the operation boundary (one send, one calibration step)

use serde::Serialize;

/// Enumerable failure classes surfaced to the presentation layer.
///
/// The presentation layer turns a kind plus context into user-visible
/// text; the engine only guarantees the kind is stable and that a
/// remediation hint exists where one makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// No matching, non-minimized window existed at send time.
    WindowNotFound,
    /// Template match failed at send time; the landmark moved or changed.
    AnchorNotFound,
    /// The target has never been calibrated; injection was refused
    /// before any synthetic input was produced.
    Uncalibrated,
    /// The global keyboard filter could not be installed. Non-fatal:
    /// the redirect feature becomes inert.
    HookInstallFailure,
    /// User-initiated calibration abort. Not an error; partial state
    /// was discarded.
    CalibrationCancelled,
    /// Backend or I/O failure outside the product-level taxonomy.
    Internal,
}

impl ErrorKind {
    /// A short remediation hint suitable for appending to user-facing
    /// error text. `None` when there is nothing actionable.
    pub fn remediation_hint(self) -> Option<&'static str> {
        match self {
            ErrorKind::WindowNotFound => {
                Some("Make sure the target application is open and not minimized to the taskbar.")
            }
            ErrorKind::AnchorNotFound => {
                Some("The anchor image could not be located on screen. Re-run calibration for this target.")
            }
            ErrorKind::Uncalibrated => {
                Some("This target has not been calibrated yet. Run calibration first.")
            }
            ErrorKind::HookInstallFailure => {
                Some("The global hotkey filter could not be installed; check input device permissions.")
            }
            ErrorKind::CalibrationCancelled | ErrorKind::Internal => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::WindowNotFound => "window-not-found",
            ErrorKind::AnchorNotFound => "anchor-not-found",
            ErrorKind::Uncalibrated => "uncalibrated",
            ErrorKind::HookInstallFailure => "hook-install-failure",
            ErrorKind::CalibrationCancelled => "calibration-cancelled",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}
