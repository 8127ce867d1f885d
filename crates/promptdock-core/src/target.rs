// Promptdock Target Model
// Containers (host application windows) and sub-targets (features inside them)

use serde::{Deserialize, Serialize};

/// How a container receives injected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// The click point is found by re-locating a calibrated anchor
    /// image inside the window at send time.
    Anchored,
    /// A native terminal. No anchor: input is delivered at the window
    /// center via a context-menu paste gesture.
    CommandLine,
}

/// One host application family sharing a top-level window shape.
///
/// Containers are data, not code: the window-class and title patterns
/// that identify a container live in the settings file so new hosts
/// can be added without a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Stable identifier, also the key in the calibration store.
    pub id: String,
    /// Regex matched against the window class.
    pub window_class: String,
    /// Default regex matched against the window title. A per-target
    /// calibration record may override this.
    pub title_pattern: String,
    pub kind: ContainerKind,
}

impl ContainerSpec {
    pub fn requires_anchor(&self) -> bool {
        self.kind == ContainerKind::Anchored
    }
}

/// A (container, sub-target) pair identifying one calibrated send
/// destination, e.g. one assistant input box inside one editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub container: String,
    pub sub_target: String,
}

impl Target {
    pub fn new(container: impl Into<String>, sub_target: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            sub_target: sub_target.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.sub_target)
    }
}

/// Built-in container definitions matching the hosts the tool ships
/// support for. The settings file may extend or replace these.
pub fn default_containers() -> Vec<ContainerSpec> {
    vec![
        ContainerSpec {
            id: "vscode".to_string(),
            window_class: "^(code|Code|Chrome_WidgetWin_1)$".to_string(),
            title_pattern: "Visual Studio Code".to_string(),
            kind: ContainerKind::Anchored,
        },
        ContainerSpec {
            id: "antigravity".to_string(),
            window_class: "^(antigravity|Antigravity|Chrome_WidgetWin_1)$".to_string(),
            title_pattern: "Antigravity".to_string(),
            kind: ContainerKind::Anchored,
        },
        ContainerSpec {
            id: "native-cli".to_string(),
            window_class: "^(ConsoleWindowClass|kitty|Alacritty|org\\.wezfurlong\\.wezterm|gnome-terminal-server)$"
                .to_string(),
            title_pattern: "(cmd|powershell|bash|zsh|terminal)".to_string(),
            kind: ContainerKind::CommandLine,
        },
    ]
}
