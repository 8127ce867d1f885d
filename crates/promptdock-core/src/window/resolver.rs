// Promptdock Window Resolver
// Per-container predicates over an OS window enumeration

use regex::RegexBuilder;

use crate::target::{ContainerKind, ContainerSpec};
use crate::window::backend::WindowInfo;

/// Errors raised while evaluating container predicates.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid pattern '{pattern}' for container '{container}': {message}")]
    BadPattern {
        container: String,
        pattern: String,
        message: String,
    },
}

/// Selects the target window for a container out of a live window
/// enumeration.
///
/// Selection never returns a window owned by this process. When more
/// than one window matches, the first in enumeration order wins; that
/// order is OS-defined and not stable, which is a documented property
/// of the tool rather than something this layer papers over.
pub struct WindowResolver {
    containers: Vec<ContainerSpec>,
    own_pid: u32,
}

impl WindowResolver {
    pub fn new(containers: Vec<ContainerSpec>) -> Self {
        Self::with_own_pid(containers, std::process::id())
    }

    /// Used by tests to simulate a foreign process id.
    pub fn with_own_pid(containers: Vec<ContainerSpec>, own_pid: u32) -> Self {
        Self {
            containers,
            own_pid,
        }
    }

    /// Apply the container's predicate to an enumeration and pick the
    /// first surviving window.
    ///
    /// `title_override` substitutes the calibrated per-target title
    /// pattern for the container default when present.
    pub fn resolve(
        &self,
        windows: &[WindowInfo],
        container: &ContainerSpec,
        title_override: Option<&str>,
    ) -> Result<Option<WindowInfo>, ResolveError> {
        let class_re = compile(container, &container.window_class)?;
        let title_pattern = title_override.unwrap_or(&container.title_pattern);
        let title_re = compile(container, title_pattern)?;

        // Pre-compile the other containers' class patterns once; the
        // command-line predicate needs them to reject embedded
        // terminal panels living inside a host editor window.
        let foreign_classes = if container.kind == ContainerKind::CommandLine {
            self.containers
                .iter()
                .filter(|c| c.id != container.id)
                .map(|c| compile(c, &c.window_class))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        for window in windows {
            if !window.visible || window.minimized {
                continue;
            }
            if window.pid != 0 && window.pid == self.own_pid {
                continue;
            }

            let matched = match container.kind {
                ContainerKind::Anchored => {
                    class_re.is_match(&window.class) && title_re.is_match(&window.title)
                }
                ContainerKind::CommandLine => {
                    let candidate =
                        class_re.is_match(&window.class) || title_re.is_match(&window.title);
                    candidate
                        && !foreign_classes
                            .iter()
                            .any(|re| re.is_match(&window.class))
                }
            };

            if matched {
                log::debug!(
                    "resolved container '{}' to window {:#x} ('{}')",
                    container.id,
                    window.id,
                    window.title
                );
                return Ok(Some(window.clone()));
            }
        }

        log::debug!("no window matched container '{}'", container.id);
        Ok(None)
    }
}

fn compile(container: &ContainerSpec, pattern: &str) -> Result<regex::Regex, ResolveError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ResolveError::BadPattern {
            container: container.id.clone(),
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::target::default_containers;

    const OWN_PID: u32 = 4242;

    fn window(id: u64, class: &str, title: &str, pid: u32) -> WindowInfo {
        WindowInfo {
            id,
            class: class.to_string(),
            title: title.to_string(),
            pid,
            rect: Rect::new(0, 0, 800, 600),
            visible: true,
            minimized: false,
        }
    }

    fn resolver() -> WindowResolver {
        WindowResolver::with_own_pid(default_containers(), OWN_PID)
    }

    fn container(id: &str) -> ContainerSpec {
        default_containers()
            .into_iter()
            .find(|c| c.id == id)
            .unwrap()
    }

    #[test]
    fn test_resolves_editor_by_class_and_title() {
        let windows = vec![
            window(1, "firefox", "Visual Studio Code - docs", 100),
            window(2, "Code", "main.rs - Visual Studio Code", 200),
        ];
        let hit = resolver()
            .resolve(&windows, &container("vscode"), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, 2);
    }

    #[test]
    fn test_skips_minimized_windows() {
        let mut minimized = window(1, "Code", "Visual Studio Code", 100);
        minimized.minimized = true;
        let windows = vec![minimized, window(2, "Code", "Visual Studio Code", 100)];
        let hit = resolver()
            .resolve(&windows, &container("vscode"), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, 2);
    }

    #[test]
    fn test_never_returns_own_process_window() {
        // Property holds for any enumeration order: try both.
        let own = window(1, "Code", "Visual Studio Code", OWN_PID);
        let other = window(2, "Code", "Visual Studio Code", 100);

        for windows in [
            vec![own.clone(), other.clone()],
            vec![other.clone(), own.clone()],
        ] {
            let hit = resolver()
                .resolve(&windows, &container("vscode"), None)
                .unwrap()
                .unwrap();
            assert_eq!(hit.pid, 100);
        }
    }

    #[test]
    fn test_own_process_only_enumeration_finds_nothing() {
        let windows = vec![window(1, "Code", "Visual Studio Code", OWN_PID)];
        let hit = resolver()
            .resolve(&windows, &container("vscode"), None)
            .unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn test_command_line_rejects_editor_embedded_terminal() {
        // A bash title inside an editor-class window must not be
        // classified as a standalone terminal.
        let windows = vec![
            window(1, "Code", "bash - Visual Studio Code", 100),
            window(2, "Alacritty", "bash", 101),
        ];
        let hit = resolver()
            .resolve(&windows, &container("native-cli"), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, 2);
    }

    #[test]
    fn test_command_line_matches_by_title_alone() {
        let windows = vec![window(1, "XTermLike", "zsh session", 100)];
        let hit = resolver()
            .resolve(&windows, &container("native-cli"), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, 1);
    }

    #[test]
    fn test_first_match_in_enumeration_order_wins() {
        let windows = vec![
            window(7, "Code", "a - Visual Studio Code", 100),
            window(8, "Code", "b - Visual Studio Code", 101),
        ];
        let hit = resolver()
            .resolve(&windows, &container("vscode"), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, 7);
    }

    #[test]
    fn test_title_override_replaces_container_default() {
        let windows = vec![
            window(1, "Code", "scratch - Visual Studio Code", 100),
            window(2, "Code", "work - Visual Studio Code", 100),
        ];
        let hit = resolver()
            .resolve(&windows, &container("vscode"), Some("^work"))
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, 2);
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let mut spec = container("vscode");
        spec.window_class = "(".to_string();
        let err = resolver().resolve(&[], &spec, None).unwrap_err();
        assert!(matches!(err, ResolveError::BadPattern { .. }));
    }

    #[test]
    fn test_title_matching_is_case_insensitive() {
        let windows = vec![window(1, "code", "MAIN.RS - VISUAL STUDIO CODE", 100)];
        let hit = resolver()
            .resolve(&windows, &container("vscode"), None)
            .unwrap();
        assert!(hit.is_some());
    }
}
