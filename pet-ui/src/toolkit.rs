//! Generic windowing layer
//!
//! The toolkit keeps its own X connection and a FIFO of [`GenericEvent`]s.
//! Windows created elsewhere are adopted with [`Toolkit::adopt_foreign`];
//! from then on keyboard, motion and window notifications for them are
//! translated here. Anything the toolkit cannot see on its connection can be
//! injected with [`GenericEventPump::push_event`].

use std::collections::HashMap;

use thiserror::Error;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError};
use x11rb::protocol::xproto::{
    ChangeWindowAttributesAux, ConnectionExt as _, EventMask, Keycode, Keysym, Window,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::events::{EventQueue, GenericEvent, GenericEventPump, WindowEvent, WindowId};

/// Upper bound of native events translated per poll.
const MAX_TRANSLATE: usize = 256;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Failed to connect toolkit to X server: {0}")]
    Connect(#[from] ConnectError),
    #[error("Toolkit connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Toolkit request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("Window {0:?} is not known to the toolkit")]
    UnknownWindow(WindowId),
}

/// Keycode to keysym table (first column only, no modifiers).
#[derive(Debug, Default, Clone)]
pub struct Keymap {
    min_keycode: Keycode,
    per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    pub fn new(min_keycode: Keycode, per_keycode: usize, keysyms: Vec<Keysym>) -> Self {
        Self {
            min_keycode,
            per_keycode,
            keysyms,
        }
    }

    fn load(conn: &RustConnection) -> Result<Self, ToolkitError> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        Ok(Self::new(
            min,
            reply.keysyms_per_keycode as usize,
            reply.keysyms,
        ))
    }

    /// Unshifted keysym for a keycode, 0 (NoSymbol) when unmapped.
    pub fn keysym(&self, keycode: Keycode) -> Keysym {
        if keycode < self.min_keycode || self.per_keycode == 0 {
            return 0;
        }
        let index = (keycode - self.min_keycode) as usize * self.per_keycode;
        self.keysyms.get(index).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Geometry {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

struct Adopted {
    id: WindowId,
    geometry: Option<Geometry>,
}

/// Window table and event translation, independent of the connection.
pub(crate) struct Translator {
    windows: HashMap<Window, Adopted>,
    next_id: u32,
    keymap: Keymap,
    queue: EventQueue,
}

impl Translator {
    pub(crate) fn new(keymap: Keymap) -> Self {
        Self {
            windows: HashMap::new(),
            next_id: 1,
            keymap,
            queue: EventQueue::new(),
        }
    }

    pub(crate) fn adopt(&mut self, window: Window) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.windows.insert(
            window,
            Adopted {
                id,
                geometry: None,
            },
        );
        id
    }

    /// Drop a window from the table, returning its native id.
    pub(crate) fn forget(&mut self, id: WindowId) -> Option<Window> {
        let window = self.native_window(id)?;
        self.windows.remove(&window);
        Some(window)
    }

    pub(crate) fn native_window(&self, id: WindowId) -> Option<Window> {
        self.windows
            .iter()
            .find(|(_, adopted)| adopted.id == id)
            .map(|(window, _)| *window)
    }

    pub(crate) fn translate(&mut self, event: Event) {
        match event {
            Event::KeyPress(e) => {
                if let Some(window) = self.id_of(e.event) {
                    let keysym = self.keymap.keysym(e.detail);
                    self.queue.push_event(GenericEvent::KeyDown {
                        window,
                        keycode: e.detail,
                        keysym,
                    });
                }
            }
            Event::KeyRelease(e) => {
                if let Some(window) = self.id_of(e.event) {
                    let keysym = self.keymap.keysym(e.detail);
                    self.queue.push_event(GenericEvent::KeyUp {
                        window,
                        keycode: e.detail,
                        keysym,
                    });
                }
            }
            Event::MotionNotify(e) => {
                if let Some(window) = self.id_of(e.event) {
                    self.queue.push_event(GenericEvent::MouseMotion {
                        window,
                        x: e.event_x as i32,
                        y: e.event_y as i32,
                    });
                }
            }
            Event::EnterNotify(e) => self.window_event(e.event, WindowEvent::Enter),
            Event::LeaveNotify(e) => self.window_event(e.event, WindowEvent::Leave),
            Event::FocusIn(e) => self.window_event(e.event, WindowEvent::FocusGained),
            Event::FocusOut(e) => self.window_event(e.event, WindowEvent::FocusLost),
            Event::Expose(e) if e.count == 0 => self.window_event(e.window, WindowEvent::Exposed),
            Event::MapNotify(e) => self.window_event(e.window, WindowEvent::Shown),
            Event::UnmapNotify(e) => self.window_event(e.window, WindowEvent::Hidden),
            Event::ConfigureNotify(e) => self.configure(
                e.window,
                Geometry {
                    x: e.x as i32,
                    y: e.y as i32,
                    width: e.width as u32,
                    height: e.height as u32,
                },
            ),
            Event::Error(e) => log::warn!("X11 error on toolkit connection: {:?}", e),
            _ => {}
        }
    }

    fn configure(&mut self, window: Window, geometry: Geometry) {
        let Some(adopted) = self.windows.get_mut(&window) else {
            return;
        };
        let previous = adopted.geometry.replace(geometry);
        let id = adopted.id;

        let moved = previous.map_or(true, |p| (p.x, p.y) != (geometry.x, geometry.y));
        let resized = previous.map_or(true, |p| (p.width, p.height) != (geometry.width, geometry.height));
        if moved {
            self.queue.push_event(GenericEvent::Window {
                window: id,
                event: WindowEvent::Moved(geometry.x, geometry.y),
            });
        }
        if resized {
            self.queue.push_event(GenericEvent::Window {
                window: id,
                event: WindowEvent::Resized(geometry.width, geometry.height),
            });
        }
    }

    fn window_event(&mut self, window: Window, event: WindowEvent) {
        if let Some(id) = self.id_of(window) {
            self.queue.push_event(GenericEvent::Window { window: id, event });
        }
    }

    fn id_of(&self, window: Window) -> Option<WindowId> {
        self.windows.get(&window).map(|adopted| adopted.id)
    }
}

impl GenericEventPump for Translator {
    fn push_event(&mut self, event: GenericEvent) {
        self.queue.push_event(event);
    }

    fn poll_event(&mut self) -> Option<GenericEvent> {
        self.queue.poll_event()
    }
}

pub struct Toolkit {
    conn: RustConnection,
    translator: Translator,
    connection_lost: bool,
}

impl Toolkit {
    /// Open the toolkit's own connection to the default display.
    pub fn connect() -> Result<Self, ToolkitError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        log::debug!("Toolkit connected to X server, screen {}", screen_num);
        let keymap = Keymap::load(&conn)?;

        Ok(Self {
            conn,
            translator: Translator::new(keymap),
            connection_lost: false,
        })
    }

    /// Bind a window created on another connection into the toolkit.
    ///
    /// The toolkit selects its default mask (structure and exposure). Callers
    /// that need more must re-apply with [`Toolkit::set_event_mask`].
    pub fn adopt_foreign(&mut self, window: Window) -> Result<WindowId, ToolkitError> {
        // Fails with BadWindow if the id does not exist.
        self.conn.get_window_attributes(window)?.reply()?;

        let aux = ChangeWindowAttributesAux::new()
            .event_mask(EventMask::STRUCTURE_NOTIFY | EventMask::EXPOSURE);
        self.conn.change_window_attributes(window, &aux)?;

        let id = self.translator.adopt(window);
        log::info!("Adopted foreign window 0x{:x} as {:?}", window, id);
        Ok(id)
    }

    /// Replace the toolkit's event selection on an adopted window and flush.
    pub fn set_event_mask(&self, id: WindowId, mask: EventMask) -> Result<(), ToolkitError> {
        let window = self
            .translator
            .native_window(id)
            .ok_or(ToolkitError::UnknownWindow(id))?;
        let aux = ChangeWindowAttributesAux::new().event_mask(mask);
        self.conn.change_window_attributes(window, &aux)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Stop tracking a window. Its selection on our connection is cleared.
    pub fn forget(&mut self, id: WindowId) {
        let Some(window) = self.translator.forget(id) else {
            return;
        };
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT);
        if let Err(e) = self
            .conn
            .change_window_attributes(window, &aux)
            .and_then(|_| self.conn.flush())
        {
            log::debug!("Could not clear event mask of 0x{:x}: {}", window, e);
        }
    }

    /// Translate what is pending on the toolkit connection into the queue.
    fn pump(&mut self) {
        for _ in 0..MAX_TRANSLATE {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => self.translator.translate(event),
                Ok(None) => break,
                Err(e) => {
                    if !self.connection_lost {
                        self.connection_lost = true;
                        log::error!("Toolkit lost its X connection: {}", e);
                        self.translator.push_event(GenericEvent::Quit);
                    }
                    break;
                }
            }
        }
    }
}

impl GenericEventPump for Toolkit {
    fn push_event(&mut self, event: GenericEvent) {
        self.translator.push_event(event);
    }

    fn poll_event(&mut self) -> Option<GenericEvent> {
        self.pump();
        self.translator.poll_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::{
        ConfigureNotifyEvent, ExposeEvent, KeyButMask, KeyPressEvent, Motion, MotionNotifyEvent,
        CONFIGURE_NOTIFY_EVENT, EXPOSE_EVENT, KEY_PRESS_EVENT, MOTION_NOTIFY_EVENT,
    };

    const WIN: Window = 0x400001;

    fn translator() -> (Translator, WindowId) {
        let mut translator = Translator::new(Keymap::new(8, 1, vec![0xff1b, 0x61]));
        let id = translator.adopt(WIN);
        (translator, id)
    }

    fn drain(translator: &mut Translator) -> Vec<GenericEvent> {
        std::iter::from_fn(|| translator.poll_event()).collect()
    }

    fn configure(window: Window, x: i16, y: i16, width: u16, height: u16) -> Event {
        Event::ConfigureNotify(ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: 0,
            x,
            y,
            width,
            height,
            border_width: 0,
            override_redirect: true,
        })
    }

    fn expose(window: Window, count: u16) -> Event {
        Event::Expose(ExposeEvent {
            response_type: EXPOSE_EVENT,
            sequence: 0,
            window,
            x: 0,
            y: 0,
            width: 32,
            height: 32,
            count,
        })
    }

    fn motion(window: Window, x: i16, y: i16) -> Event {
        Event::MotionNotify(MotionNotifyEvent {
            response_type: MOTION_NOTIFY_EVENT,
            detail: Motion::NORMAL,
            sequence: 0,
            time: 0,
            root: 1,
            event: window,
            child: 0,
            root_x: x,
            root_y: y,
            event_x: x,
            event_y: y,
            state: KeyButMask::from(0u16),
            same_screen: true,
        })
    }

    fn key_press(window: Window, keycode: Keycode) -> Event {
        Event::KeyPress(KeyPressEvent {
            response_type: KEY_PRESS_EVENT,
            detail: keycode,
            sequence: 0,
            time: 0,
            root: 1,
            event: window,
            child: 0,
            root_x: 0,
            root_y: 0,
            event_x: 0,
            event_y: 0,
            state: KeyButMask::from(0u16),
            same_screen: true,
        })
    }

    #[test]
    fn test_first_configure_reports_move_and_resize() {
        let (mut t, id) = translator();
        t.translate(configure(WIN, 10, 20, 32, 32));
        assert_eq!(
            drain(&mut t),
            vec![
                GenericEvent::Window { window: id, event: WindowEvent::Moved(10, 20) },
                GenericEvent::Window { window: id, event: WindowEvent::Resized(32, 32) },
            ]
        );
    }

    #[test]
    fn test_configure_reports_only_what_changed() {
        let (mut t, id) = translator();
        t.translate(configure(WIN, 10, 20, 32, 32));
        drain(&mut t);

        t.translate(configure(WIN, 11, 20, 32, 32));
        assert_eq!(
            drain(&mut t),
            vec![GenericEvent::Window { window: id, event: WindowEvent::Moved(11, 20) }]
        );

        t.translate(configure(WIN, 11, 20, 64, 32));
        assert_eq!(
            drain(&mut t),
            vec![GenericEvent::Window { window: id, event: WindowEvent::Resized(64, 32) }]
        );

        // Restack only: nothing to report.
        t.translate(configure(WIN, 11, 20, 64, 32));
        assert!(drain(&mut t).is_empty());
    }

    #[test]
    fn test_expose_only_on_last_of_series() {
        let (mut t, id) = translator();
        t.translate(expose(WIN, 2));
        t.translate(expose(WIN, 1));
        assert!(drain(&mut t).is_empty());
        t.translate(expose(WIN, 0));
        assert_eq!(
            drain(&mut t),
            vec![GenericEvent::Window { window: id, event: WindowEvent::Exposed }]
        );
    }

    #[test]
    fn test_motion_and_keys_are_translated() {
        let (mut t, id) = translator();
        t.translate(motion(WIN, 5, 7));
        t.translate(key_press(WIN, 8));
        t.translate(key_press(WIN, 9));
        assert_eq!(
            drain(&mut t),
            vec![
                GenericEvent::MouseMotion { window: id, x: 5, y: 7 },
                GenericEvent::KeyDown { window: id, keycode: 8, keysym: 0xff1b },
                GenericEvent::KeyDown { window: id, keycode: 9, keysym: 0x61 },
            ]
        );
    }

    #[test]
    fn test_events_for_unknown_windows_are_dropped() {
        let (mut t, _) = translator();
        let stranger = 0x500001;
        t.translate(configure(stranger, 0, 0, 10, 10));
        t.translate(expose(stranger, 0));
        t.translate(motion(stranger, 1, 1));
        t.translate(key_press(stranger, 8));
        assert!(drain(&mut t).is_empty());
    }

    #[test]
    fn test_forgotten_window_is_no_longer_translated() {
        let (mut t, id) = translator();
        assert_eq!(t.forget(id), Some(WIN));
        assert_eq!(t.forget(id), None);
        t.translate(motion(WIN, 1, 1));
        assert!(drain(&mut t).is_empty());
    }

    #[test]
    fn test_pushed_events_keep_order_with_translated_ones() {
        let (mut t, id) = translator();
        t.translate(motion(WIN, 1, 2));
        t.push_event(GenericEvent::Quit);
        assert_eq!(
            drain(&mut t),
            vec![GenericEvent::MouseMotion { window: id, x: 1, y: 2 }, GenericEvent::Quit]
        );
    }

    #[test]
    fn test_keymap_lookup_uses_first_column() {
        // Two keysyms per keycode, keycodes 8 and 9.
        let keymap = Keymap::new(8, 2, vec![0xff1b, 0, 0x61, 0x41]);
        assert_eq!(keymap.keysym(8), 0xff1b);
        assert_eq!(keymap.keysym(9), 0x61);
    }

    #[test]
    fn test_keymap_out_of_range_is_no_symbol() {
        let keymap = Keymap::new(8, 2, vec![0xff1b, 0]);
        assert_eq!(keymap.keysym(7), 0);
        assert_eq!(keymap.keysym(200), 0);
        assert_eq!(Keymap::default().keysym(10), 0);
    }
}
