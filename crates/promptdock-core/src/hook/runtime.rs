// Promptdock Hotkey Runtime
// evdev grab loop plus uinput forwarding on a dedicated thread

use super::filter::{classify, codes, HookConfig, HookDecision, KeyEvent, KeyStateQuery, KeyStep};
use evdev::{Device, EventType, InputEvent};
use std::collections::HashSet;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Name prefix of the forwarding device. Doubles as the self-injection
/// marker: devices carrying it are never grabbed, so replayed events
/// re-enter the system without passing through the filter again.
const VIRT_DEVICE_PREFIX: &str = "Promptdock (virtual)";

const POLL_TIMEOUT_MS: i32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("no keyboard devices found")]
    NoKeyboards,

    #[error("failed to create forwarding device: {0}")]
    DeviceCreation(String),

    #[error("failed to write event: {0}")]
    WriteError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A request to run the alternate action, crossing from the hook
/// thread to the main control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectRequest;

/// Virtual uinput keyboard that re-emits pass-through events and
/// synthesized sequences.
struct ForwardDevice {
    device: evdev::uinput::VirtualDevice,
}

impl ForwardDevice {
    fn new() -> Result<Self, HookError> {
        use evdev::uinput::VirtualDeviceBuilder;
        use evdev::AttributeSet;

        let mut keys = AttributeSet::new();
        for code in 0..256u16 {
            keys.insert(evdev::Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(|e: std::io::Error| HookError::DeviceCreation(e.to_string()))?
            .name(&format!("{} Keyboard", VIRT_DEVICE_PREFIX))
            .with_keys(&keys)
            .map_err(|e: std::io::Error| HookError::DeviceCreation(e.to_string()))?
            .build()
            .map_err(|e: std::io::Error| HookError::DeviceCreation(e.to_string()))?;

        Ok(Self { device })
    }

    fn emit_key(&mut self, code: u16, value: i32) -> Result<(), HookError> {
        let key_event = InputEvent::new(EventType::KEY, code, value);
        // SYN is required for the kernel to process the key event.
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        self.device
            .emit(&[key_event, syn_event])
            .map_err(|e: std::io::Error| HookError::WriteError(e.to_string()))
    }

    fn run_sequence(&mut self, sequence: &[KeyStep]) -> Result<(), HookError> {
        for step in sequence {
            match *step {
                KeyStep::Press(code) => self.emit_key(code, 1)?,
                KeyStep::Release(code) => self.emit_key(code, 0)?,
                KeyStep::Tap(code) => {
                    self.emit_key(code, 1)?;
                    self.emit_key(code, 0)?;
                }
            }
        }
        Ok(())
    }
}

/// Physical keyboards held under an exclusive grab.
///
/// Ungrab runs on drop so the keyboard never stays captured after a
/// panic or shutdown.
struct GrabbedKeyboards {
    devices: Vec<Device>,
    poll_fds: Vec<libc::pollfd>,
}

impl GrabbedKeyboards {
    fn grab_all() -> Result<Self, HookError> {
        let mut devices: Vec<Device> = evdev::enumerate()
            .map(|(_, device)| device)
            .filter(Self::is_physical_keyboard)
            .collect();

        if devices.is_empty() {
            return Err(HookError::NoKeyboards);
        }

        // A previous instance may have crashed while holding the
        // grab; clear it before taking our own.
        for device in &mut devices {
            let _ = device.ungrab();
        }
        for device in &mut devices {
            device.grab()?;
        }

        let poll_fds = devices
            .iter()
            .map(|d| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        Ok(Self { devices, poll_fds })
    }

    fn is_physical_keyboard(device: &Device) -> bool {
        if !device.supported_events().contains(EventType::KEY) {
            return false;
        }
        // Skip our own forwarding device to prevent a feedback loop.
        if device.name().unwrap_or("").starts_with(VIRT_DEVICE_PREFIX) {
            return false;
        }
        let Some(keys) = device.supported_keys() else {
            return false;
        };
        // Letter-row keys distinguish keyboards from headsets and
        // power buttons that also report EV_KEY.
        const LETTER_CODES: &[u16] = &[16, 17, 18, 30, 44, 57];
        LETTER_CODES
            .iter()
            .all(|code| keys.contains(evdev::Key::new(*code)))
    }

    /// Poll all grabbed devices. Timeouts and EINTR return an empty
    /// batch so the caller can re-check its shutdown flag.
    fn poll_events(&mut self, timeout_ms: i32) -> Result<Vec<InputEvent>, HookError> {
        let poll_result = unsafe {
            libc::poll(
                self.poll_fds.as_mut_ptr(),
                self.poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if poll_result < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(Vec::new());
            }
            return Err(HookError::Io(err));
        }
        if poll_result == 0 {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        for (i, device) in self.devices.iter_mut().enumerate() {
            if self.poll_fds[i].revents & libc::POLLIN != 0 {
                if let Ok(device_events) = device.fetch_events() {
                    events.extend(device_events);
                }
            }
        }
        Ok(events)
    }

    fn ungrab_all(&mut self) {
        for device in &mut self.devices {
            let _ = device.ungrab();
        }
    }
}

impl Drop for GrabbedKeyboards {
    fn drop(&mut self) {
        self.ungrab_all();
    }
}

struct HeldKeys(HashSet<u16>);

impl HeldKeys {
    fn apply(&mut self, code: u16, value: i32) {
        match value {
            1 => {
                self.0.insert(code);
            }
            0 => {
                self.0.remove(&code);
            }
            _ => {}
        }
    }
}

impl KeyStateQuery for HeldKeys {
    fn is_held(&self, code: u16) -> bool {
        self.0.contains(&code)
    }
}

/// Handle to the running interceptor thread.
///
/// Dropping the handle requests shutdown and joins the thread, which
/// releases the device grab.
pub struct HotkeyInterceptor {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyInterceptor {
    /// Install the global filter.
    ///
    /// Install failure (no devices, insufficient privilege) is logged
    /// and returns None; the feature is then inert for the rest of
    /// the process lifetime.
    pub fn install(
        cfg: HookConfig,
        enabled: Arc<AtomicBool>,
        redirect_tx: Sender<RedirectRequest>,
    ) -> Option<Self> {
        let keyboards = match GrabbedKeyboards::grab_all() {
            Ok(k) => k,
            Err(e) => {
                log::warn!("hotkey filter not installed: {}", e);
                return None;
            }
        };
        let forward = match ForwardDevice::new() {
            Ok(f) => f,
            Err(e) => {
                log::warn!("hotkey filter not installed: {}", e);
                return None;
            }
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);
        // The shared `enabled` flag is the live redirect toggle; the
        // loop classifies with redirects armed and gates on the flag.
        let cfg = cfg.armed();
        let thread = std::thread::Builder::new()
            .name("promptdock-hook".to_string())
            .spawn(move || {
                run_loop(keyboards, forward, cfg, enabled, redirect_tx, thread_shutdown);
            });

        match thread {
            Ok(handle) => Some(Self {
                shutdown,
                thread: Some(handle),
            }),
            Err(e) => {
                log::warn!("hotkey filter thread failed to start: {}", e);
                None
            }
        }
    }
}

impl Drop for HotkeyInterceptor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_loop(
    mut keyboards: GrabbedKeyboards,
    mut forward: ForwardDevice,
    cfg: HookConfig,
    enabled: Arc<AtomicBool>,
    redirect_tx: Sender<RedirectRequest>,
    shutdown: Arc<AtomicBool>,
) {
    let mut held = HeldKeys(HashSet::new());
    log::info!(
        "hotkey filter active: trigger code {} with {:?} (override {:?})",
        cfg.trigger,
        cfg.primary,
        cfg.override_modifier
    );

    while !shutdown.load(Ordering::Relaxed) {
        let events = match keyboards.poll_events(POLL_TIMEOUT_MS) {
            Ok(events) => events,
            Err(e) => {
                log::error!("hotkey filter stopping: {}", e);
                break;
            }
        };

        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }
            let code = event.code();
            let value = event.value();
            held.apply(code, value);

            if value == 2 || !enabled.load(Ordering::Relaxed) {
                // Repeats and disabled state forward unchanged.
                if forward.emit_key(code, value).is_err() {
                    log::error!("hotkey filter lost its forwarding device");
                    return;
                }
                continue;
            }

            let key_event = KeyEvent {
                code,
                pressed: value == 1,
                // Grabbed devices are physical by construction; the
                // forwarding device is excluded from the grab set.
                from_virtual: false,
            };

            let result = match classify(key_event, &held, &cfg) {
                HookDecision::PassThrough => forward.emit_key(code, value),
                HookDecision::ForwardOriginal { sequence } => {
                    log::debug!("override held, replaying original combination");
                    forward.run_sequence(&sequence)
                }
                HookDecision::Redirect { cancel } => {
                    log::debug!("hotkey redirected");
                    let emitted = forward.run_sequence(&cancel);
                    if redirect_tx.send(RedirectRequest).is_err() {
                        log::warn!("redirect receiver gone, disabling redirects");
                        enabled.store(false, Ordering::Relaxed);
                    }
                    emitted
                }
            };
            if result.is_err() {
                log::error!("hotkey filter lost its forwarding device");
                return;
            }
        }
    }

    // Leave no phantom modifiers pressed on the way out.
    for code in [
        codes::KEY_LEFTMETA,
        codes::KEY_RIGHTMETA,
        codes::KEY_LEFTSHIFT,
        codes::KEY_RIGHTSHIFT,
        codes::KEY_LEFTCTRL,
        codes::KEY_RIGHTCTRL,
    ] {
        if held.is_held(code) {
            let _ = forward.emit_key(code, 0);
        }
    }
}
