//! Window resolution
//!
//! Enumerates OS top-level windows and selects the one matching a
//! container's class/title predicates, excluding this process's own
//! windows.

mod backend;
mod resolver;
#[cfg(feature = "native-backends")]
mod x11;

pub use backend::{BackendError, WindowBackend, WindowInfo};
#[cfg(test)]
pub(crate) use backend::fake;
pub use resolver::{ResolveError, WindowResolver};
#[cfg(feature = "native-backends")]
pub use x11::X11WindowBackend;
