// Promptdock X11 Window Backend
// EWMH-based enumeration, activation and stacking control

#![cfg(feature = "native-backends")]

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    AtomEnum, ClientMessageEvent, ConnectionExt, EventMask, Window,
};
use x11rb::rust_connection::RustConnection;

use crate::geometry::Rect;
use crate::window::backend::{BackendError, WindowBackend, WindowInfo};

x11rb::atom_manager! {
    Atoms:
    AtomsCookie {
        _NET_CLIENT_LIST,
        _NET_WM_NAME,
        _NET_WM_PID,
        _NET_WM_STATE,
        _NET_WM_STATE_HIDDEN,
        _NET_WM_STATE_ABOVE,
        _NET_ACTIVE_WINDOW,
        UTF8_STRING,
    }
}

/// Window backend speaking EWMH to an X11 server (or XWayland).
pub struct X11WindowBackend {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
}

impl X11WindowBackend {
    pub fn connect() -> Result<Self, BackendError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| BackendError::QueryFailed(e.to_string()))?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = Atoms::new(&conn)
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?
            .reply()
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?;
        Ok(Self { conn, root, atoms })
    }

    fn client_list(&self) -> Result<Vec<Window>, BackendError> {
        let reply = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms._NET_CLIENT_LIST,
                AtomEnum::WINDOW,
                0,
                u32::MAX,
            )
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?
            .reply()
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?;
        Ok(reply.value32().into_iter().flatten().collect())
    }

    fn wm_class(&self, window: Window) -> String {
        let reply = match self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
            .map(|c| c.reply())
        {
            Ok(Ok(reply)) => reply,
            _ => return String::new(),
        };
        // WM_CLASS holds instance\0class\0; the class component is the
        // one container predicates match against.
        let raw = reply.value;
        let mut parts = raw.split(|b| *b == 0).filter(|s| !s.is_empty());
        let instance = parts.next();
        let class = parts.next().or(instance);
        class
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default()
    }

    fn title(&self, window: Window) -> String {
        // Prefer _NET_WM_NAME (UTF-8), fall back to legacy WM_NAME.
        if let Ok(Ok(reply)) = self
            .conn
            .get_property(
                false,
                window,
                self.atoms._NET_WM_NAME,
                self.atoms.UTF8_STRING,
                0,
                u32::MAX,
            )
            .map(|c| c.reply())
        {
            if !reply.value.is_empty() {
                return String::from_utf8_lossy(&reply.value).into_owned();
            }
        }
        if let Ok(Ok(reply)) = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, u32::MAX)
            .map(|c| c.reply())
        {
            return String::from_utf8_lossy(&reply.value).into_owned();
        }
        String::new()
    }

    fn pid(&self, window: Window) -> u32 {
        self.conn
            .get_property(
                false,
                window,
                self.atoms._NET_WM_PID,
                AtomEnum::CARDINAL,
                0,
                1,
            )
            .ok()
            .and_then(|c| c.reply().ok())
            .and_then(|r| r.value32().and_then(|mut it| it.next()))
            .unwrap_or(0)
    }

    fn is_hidden(&self, window: Window) -> bool {
        self.conn
            .get_property(
                false,
                window,
                self.atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                0,
                u32::MAX,
            )
            .ok()
            .and_then(|c| c.reply().ok())
            .map(|r| {
                r.value32()
                    .into_iter()
                    .flatten()
                    .any(|a| a == self.atoms._NET_WM_STATE_HIDDEN)
            })
            .unwrap_or(false)
    }

    fn geometry(&self, window: Window) -> Result<Rect, BackendError> {
        let geom = self
            .conn
            .get_geometry(window)
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?
            .reply()
            .map_err(|_| BackendError::Gone(window as u64))?;
        let abs = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?
            .reply()
            .map_err(|_| BackendError::Gone(window as u64))?;
        Ok(Rect::new(
            i32::from(abs.dst_x),
            i32::from(abs.dst_y),
            u32::from(geom.width),
            u32::from(geom.height),
        ))
    }

    fn send_root_message(
        &self,
        window: Window,
        message_type: x11rb::protocol::xproto::Atom,
        data: [u32; 5],
    ) -> Result<(), BackendError> {
        let event = ClientMessageEvent::new(32, window, message_type, data);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?;
        self.conn
            .flush()
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}

impl WindowBackend for X11WindowBackend {
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>, BackendError> {
        let mut windows = Vec::new();
        for window in self.client_list()? {
            // Windows disappearing mid-enumeration are skipped, not
            // treated as failures.
            let Ok(rect) = self.geometry(window) else {
                continue;
            };
            windows.push(WindowInfo {
                id: u64::from(window),
                class: self.wm_class(window),
                title: self.title(window),
                pid: self.pid(window),
                rect,
                visible: true,
                minimized: self.is_hidden(window),
            });
        }
        Ok(windows)
    }

    fn activate(&mut self, id: u64) -> Result<(), BackendError> {
        let window = id as Window;
        self.conn
            .map_window(window)
            .map_err(|e| BackendError::QueryFailed(e.to_string()))?;
        // Source indication 2 = direct user action, which window
        // managers honor for focus stealing.
        self.send_root_message(
            window,
            self.atoms._NET_ACTIVE_WINDOW,
            [2, x11rb::CURRENT_TIME, 0, 0, 0],
        )
    }

    fn set_topmost(&mut self, id: u64, topmost: bool) -> Result<(), BackendError> {
        let action = u32::from(topmost); // 1 = add, 0 = remove
        self.send_root_message(
            id as Window,
            self.atoms._NET_WM_STATE,
            [action, self.atoms._NET_WM_STATE_ABOVE, 0, 1, 0],
        )
    }
}
