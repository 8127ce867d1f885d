// Promptdock Engine
// Worker-thread orchestration, completion notifications and the redirect action

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::anchor::screen::ScreenSource;
use crate::anchor::AnchorLocator;
use crate::calibration::{CalibrationSession, CalibrationStore, StoreError};
use crate::error::ErrorKind;
use crate::inject::{InjectionSequencer, InputSynth, Payload, PointerButton, SendError, SendOptions};
use crate::settings::Settings;
use crate::target::{ContainerKind, ContainerSpec, Target};
use crate::window::{WindowBackend, WindowResolver};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unknown container '{0}'")]
    UnknownContainer(String),

    #[error("backend unavailable: {0}")]
    Backend(String),

    #[error("failed to launch companion: {0}")]
    Launch(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Send(e) => e.kind(),
            EngineError::Store(_)
            | EngineError::UnknownContainer(_)
            | EngineError::Backend(_)
            | EngineError::Launch(_) => ErrorKind::Internal,
        }
    }

    pub fn remediation_hint(&self) -> Option<&'static str> {
        self.kind().remediation_hint()
    }
}

/// Completion of one asynchronous send, delivered to the control loop.
#[derive(Debug)]
pub struct Notification {
    pub target: Target,
    pub result: Result<(), EngineError>,
}

/// Per-thread construction of OS backends.
///
/// Send operations run on worker threads and the backends are not
/// shareable across threads, so the engine builds a fresh set for
/// each operation.
pub trait BackendFactory: Send + Sync + 'static {
    type Windows: WindowBackend;
    type Screen: ScreenSource;
    type Synth: InputSynth;

    fn window_backend(&self) -> Result<Self::Windows, EngineError>;
    fn screen_source(&self) -> Result<Self::Screen, EngineError>;
    fn input_synth(&self) -> Result<Self::Synth, EngineError>;
}

/// The collaborator surface the presentation layer drives.
///
/// `send` never blocks the caller: each operation runs on its own
/// worker thread and reports back through the notification channel.
/// The calibration store is the only shared mutable state; workers
/// read it, calibration writes it from the control thread.
pub struct Engine<F: BackendFactory> {
    factory: Arc<F>,
    settings: Arc<Settings>,
    resolver: Arc<WindowResolver>,
    store: Arc<RwLock<CalibrationStore>>,
    notify_tx: Sender<Notification>,
    redirect_enabled: Arc<AtomicBool>,
}

impl<F: BackendFactory> Engine<F> {
    /// Load the calibration store and wire up the notification
    /// channel. The receiver end belongs to the control loop.
    pub fn new(factory: F, settings: Settings) -> Result<(Self, Receiver<Notification>), EngineError> {
        let store = CalibrationStore::load(&settings.store_path)?;
        let resolver = WindowResolver::new(settings.containers.clone());
        let (notify_tx, notify_rx) = channel();
        let redirect_enabled = Arc::new(AtomicBool::new(settings.hotkey.redirect_enabled));
        Ok((
            Self {
                factory: Arc::new(factory),
                settings: Arc::new(settings),
                resolver: Arc::new(resolver),
                store: Arc::new(RwLock::new(store)),
                notify_tx,
                redirect_enabled,
            },
            notify_rx,
        ))
    }

    /// Deliver `payload` to `target` on a worker thread. Completion
    /// arrives as a `Notification`; the join handle is only useful to
    /// tests.
    pub fn send(
        &self,
        target: Target,
        payload: Payload,
        options: SendOptions,
    ) -> std::thread::JoinHandle<()> {
        let factory = Arc::clone(&self.factory);
        let settings = Arc::clone(&self.settings);
        let resolver = Arc::clone(&self.resolver);
        let store = Arc::clone(&self.store);
        let notify_tx = self.notify_tx.clone();

        std::thread::spawn(move || {
            let record = store.read().get(&target).cloned();
            let result = (|| {
                let mut windows = factory.window_backend()?;
                let screen = factory.screen_source()?;
                let mut synth = factory.input_synth()?;
                let mut locator = AnchorLocator::new(screen, settings.confidence_threshold);
                let mut sequencer = InjectionSequencer {
                    windows: &mut windows,
                    locator: &mut locator,
                    synth: &mut synth,
                    resolver: &resolver,
                    settings: &settings,
                };
                sequencer
                    .send(&target, record.as_ref(), &payload, &options)
                    .map_err(EngineError::from)
            })();

            match &result {
                Ok(()) => log::info!("send to {} completed", target),
                Err(e) => log::error!("send to {} failed: {}", target, e),
            }
            // Receiver gone means the control loop is shutting down.
            let _ = notify_tx.send(Notification { target, result });
        })
    }

    /// Run an interactive calibration for `target`.
    ///
    /// The closure drives the session with overlay events. Runs on
    /// the calling thread; the store write lock is held for the whole
    /// session, which is fine because calibration is modal.
    pub fn calibrate_with<R>(
        &self,
        target: Target,
        f: impl FnOnce(&mut CalibrationSession<'_, F::Screen>) -> R,
    ) -> Result<R, EngineError> {
        let container = self
            .settings
            .container(&target.container)
            .cloned()
            .ok_or_else(|| EngineError::UnknownContainer(target.container.clone()))?;
        let screen = self.factory.screen_source()?;
        let mut locator = AnchorLocator::new(screen, self.settings.confidence_threshold);
        let mut store = self.store.write();
        let mut session = CalibrationSession::new(
            target,
            &container,
            &self.settings,
            &mut locator,
            &mut store,
        );
        Ok(f(&mut session))
    }

    pub fn calibration(&self, target: &Target) -> Option<crate::calibration::CalibrationRecord> {
        self.store.read().get(target).cloned()
    }

    pub fn set_redirect_enabled(&self, enabled: bool) {
        self.redirect_enabled.store(enabled, Ordering::Relaxed);
        log::info!(
            "hotkey redirect {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Flag shared with the hotkey interceptor thread. Read without
    /// locking; a benign race for an interactive tool.
    pub fn redirect_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.redirect_enabled)
    }

    /// The redirect alternate action: raise the companion window
    /// (launching it when absent), click its fixed activation point,
    /// and pin it briefly on top. Runs on the control thread when a
    /// redirect request arrives from the interceptor.
    pub fn handle_redirect(&self) -> Result<(), EngineError> {
        let companion = &self.settings.companion;
        let spec = ContainerSpec {
            id: "companion".to_string(),
            window_class: companion.window_class.clone(),
            title_pattern: companion.title_pattern.clone(),
            kind: ContainerKind::Anchored,
        };

        let mut windows = self.factory.window_backend()?;
        let list = windows.list_windows().map_err(SendError::from)?;
        let mut found = self
            .resolver
            .resolve(&list, &spec, None)
            .map_err(SendError::from)?;

        if found.is_none() {
            let Some(command) = &companion.launch_command else {
                return Err(EngineError::Send(SendError::WindowNotFound(spec.id.clone())));
            };
            log::info!("companion not running, launching: {}", command);
            std::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .spawn()
                .map_err(|e| EngineError::Launch(e.to_string()))?;
            std::thread::sleep(self.settings.settle_delay());
            let list = windows.list_windows().map_err(SendError::from)?;
            found = self
                .resolver
                .resolve(&list, &spec, None)
                .map_err(SendError::from)?;
        }

        let Some(window) = found else {
            return Err(EngineError::Send(SendError::WindowNotFound(spec.id.clone())));
        };

        windows.activate(window.id).map_err(SendError::from)?;
        std::thread::sleep(self.settings.settle_delay());

        let mut synth = self.factory.input_synth()?;
        let click = crate::geometry::Point::new(
            window.rect.x + companion.click_x,
            window.rect.y + companion.click_y,
        );
        synth
            .move_pointer(click)
            .map_err(|source| SendError::Synth {
                step: "companion-move",
                source,
            })?;
        synth
            .click(PointerButton::Left)
            .map_err(|source| SendError::Synth {
                step: "companion-click",
                source,
            })?;

        windows.set_topmost(window.id, true).map_err(SendError::from)?;
        std::thread::sleep(std::time::Duration::from_millis(companion.topmost_ms));
        windows.set_topmost(window.id, false).map_err(SendError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::BufferScreenSource;
    use crate::calibration::CalibrationRecord;
    use crate::geometry::{Point, Rect};
    use crate::inject::synth::fake::{RecordingSynth, SynthOp};
    use crate::inject::SynthError;
    use crate::window::fake::ScriptedWindows;
    use crate::window::{BackendError, WindowInfo};
    use image::{Rgba, RgbaImage};
    use parking_lot::Mutex;

    /// Backends handed out by the test factory share state through
    /// mutexes so assertions can observe what the worker did.
    struct SharedWindows(Arc<Mutex<ScriptedWindows>>);

    impl WindowBackend for SharedWindows {
        fn list_windows(&mut self) -> Result<Vec<WindowInfo>, BackendError> {
            self.0.lock().list_windows()
        }
        fn activate(&mut self, id: u64) -> Result<(), BackendError> {
            self.0.lock().activate(id)
        }
        fn set_topmost(&mut self, id: u64, topmost: bool) -> Result<(), BackendError> {
            self.0.lock().set_topmost(id, topmost)
        }
    }

    struct SharedSynth(Arc<Mutex<RecordingSynth>>);

    impl InputSynth for SharedSynth {
        fn pointer_position(&mut self) -> Result<Point, SynthError> {
            self.0.lock().pointer_position()
        }
        fn move_pointer(&mut self, to: Point) -> Result<(), SynthError> {
            self.0.lock().move_pointer(to)
        }
        fn click(&mut self, button: PointerButton) -> Result<(), SynthError> {
            self.0.lock().click(button)
        }
        fn tap(&mut self, key: crate::inject::ChordKey) -> Result<(), SynthError> {
            self.0.lock().tap(key)
        }
        fn chord(&mut self, chord: &crate::inject::Chord) -> Result<(), SynthError> {
            self.0.lock().chord(chord)
        }
        fn set_clipboard(&mut self, text: &str) -> Result<(), SynthError> {
            self.0.lock().set_clipboard(text)
        }
    }

    struct TestFactory {
        windows: Arc<Mutex<ScriptedWindows>>,
        synth: Arc<Mutex<RecordingSynth>>,
        frame: RgbaImage,
    }

    impl BackendFactory for TestFactory {
        type Windows = SharedWindows;
        type Screen = BufferScreenSource;
        type Synth = SharedSynth;

        fn window_backend(&self) -> Result<SharedWindows, EngineError> {
            Ok(SharedWindows(Arc::clone(&self.windows)))
        }
        fn screen_source(&self) -> Result<BufferScreenSource, EngineError> {
            Ok(BufferScreenSource::new(self.frame.clone()))
        }
        fn input_synth(&self) -> Result<SharedSynth, EngineError> {
            Ok(SharedSynth(Arc::clone(&self.synth)))
        }
    }

    fn blank_frame() -> RgbaImage {
        RgbaImage::from_pixel(800, 600, Rgba([40, 40, 40, 255]))
    }

    fn terminal_window() -> WindowInfo {
        WindowInfo {
            id: 21,
            class: "Alacritty".to_string(),
            title: "bash".to_string(),
            pid: 77,
            rect: Rect::new(0, 0, 640, 480),
            visible: true,
            minimized: false,
        }
    }

    fn companion_window() -> WindowInfo {
        WindowInfo {
            id: 31,
            class: "promptdock-panel".to_string(),
            title: "Promptdock".to_string(),
            pid: 78,
            rect: Rect::new(1000, 200, 300, 500),
            visible: true,
            minimized: false,
        }
    }

    fn engine_with(
        windows: Vec<WindowInfo>,
    ) -> (
        Engine<TestFactory>,
        Receiver<Notification>,
        Arc<Mutex<ScriptedWindows>>,
        Arc<Mutex<RecordingSynth>>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.settle_delay_ms = 0;
        settings.pace_delay_ms = 0;
        settings.companion.topmost_ms = 0;
        settings.store_path = dir.path().join("targets.json");
        settings.anchors_dir = dir.path().join("anchors");

        let shared_windows = Arc::new(Mutex::new(ScriptedWindows::new(windows)));
        let shared_synth = Arc::new(Mutex::new(RecordingSynth::new(Point::new(5, 5))));
        let factory = TestFactory {
            windows: Arc::clone(&shared_windows),
            synth: Arc::clone(&shared_synth),
            frame: blank_frame(),
        };
        let (engine, rx) = Engine::new(factory, settings).unwrap();
        (engine, rx, shared_windows, shared_synth, dir)
    }

    #[test]
    fn test_send_completes_and_notifies() {
        let (engine, rx, _, synth, _dir) = engine_with(vec![terminal_window()]);
        let target = Target::new("native-cli", "default");

        engine
            .send(
                target.clone(),
                Payload::Text("uptime".to_string()),
                SendOptions { auto_submit: true },
            )
            .join()
            .unwrap();

        let notification = rx.recv().unwrap();
        assert_eq!(notification.target, target);
        assert!(notification.result.is_ok());
        assert!(synth
            .lock()
            .ops
            .contains(&SynthOp::Clipboard("uptime".to_string())));
    }

    #[test]
    fn test_send_uncalibrated_notifies_error_kind() {
        let (engine, rx, _, synth, _dir) = engine_with(vec![WindowInfo {
            id: 41,
            class: "Code".to_string(),
            title: "lib.rs - Visual Studio Code".to_string(),
            pid: 79,
            rect: Rect::new(0, 0, 800, 600),
            visible: true,
            minimized: false,
        }]);

        engine
            .send(
                Target::new("vscode", "copilot"),
                Payload::Text("hi".to_string()),
                SendOptions::default(),
            )
            .join()
            .unwrap();

        let notification = rx.recv().unwrap();
        let err = notification.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Uncalibrated);
        assert!(synth.lock().ops.is_empty());
    }

    #[test]
    fn test_calibrate_with_persists_through_shared_store() {
        let (engine, _rx, _, _, dir) = engine_with(vec![]);
        let target = Target::new("vscode", "copilot");

        // No interactive flow here; write a record through the same
        // lock the sessions use.
        let record = CalibrationRecord::calibrated(
            dir.path().join("a.png"),
            3,
            -4,
            "Visual Studio Code".to_string(),
        );
        engine.store.write().upsert(&target, record).unwrap();

        let read_back = engine.calibration(&target).unwrap();
        assert_eq!((read_back.offset_x, read_back.offset_y), (3, -4));
    }

    #[test]
    fn test_redirect_flag_is_shared() {
        let (engine, _rx, _, _, _dir) = engine_with(vec![]);
        let flag = engine.redirect_flag();
        assert!(!flag.load(Ordering::Relaxed));
        engine.set_redirect_enabled(true);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_handle_redirect_clicks_companion_and_pins_it() {
        let (engine, _rx, windows, synth, _dir) =
            engine_with(vec![terminal_window(), companion_window()]);

        engine.handle_redirect().unwrap();

        // Default companion click point is (40, 40) from the origin.
        let ops = synth.lock().ops.clone();
        assert_eq!(
            ops,
            vec![
                SynthOp::Move(Point::new(1040, 240)),
                SynthOp::Click(PointerButton::Left),
            ]
        );
        let guard = windows.lock();
        assert_eq!(guard.activated, vec![31]);
        assert_eq!(guard.topmost_calls, vec![(31, true), (31, false)]);
    }

    #[test]
    fn test_handle_redirect_without_companion_or_launcher_fails() {
        let (engine, _rx, _, synth, _dir) = engine_with(vec![terminal_window()]);
        let err = engine.handle_redirect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WindowNotFound);
        assert!(synth.lock().ops.is_empty());
    }
}
