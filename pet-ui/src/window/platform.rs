//! X11 specifics: atoms, event masks, visual selection and WM properties

use std::collections::VecDeque;

use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::render::ConnectionExt as _;
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    AtomEnum, ClientMessageEvent, ClipOrdering, ConnectionExt as _, EventMask, PropMode,
    VisualClass, Visualid, Window,
};
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;

use crate::events::{NativeEvent, NativeEventSource};

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        UTF8_STRING,
        _NET_WM_NAME,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_WINDOW_OPACITY,
        _MOTIF_WM_HINTS,
    }
}

/// `_NET_WM_STATE` client message action.
const NET_WM_STATE_ADD: u32 = 1;

/// `_MOTIF_WM_HINTS` flag saying the decorations field is valid.
const MOTIF_HINTS_DECORATIONS: u32 = 1 << 1;

/// Upper bound of native events buffered per poll.
const MAX_DRAIN: usize = 256;

/// Events the toolkit handles on its own connection. Buttons are missing on
/// purpose: only one client may select them and the bridge owns them.
pub fn toolkit_event_mask() -> EventMask {
    EventMask::FOCUS_CHANGE
        | EventMask::ENTER_WINDOW
        | EventMask::LEAVE_WINDOW
        | EventMask::EXPOSURE
        | EventMask::POINTER_MOTION
        | EventMask::KEY_PRESS
        | EventMask::KEY_RELEASE
        | EventMask::PROPERTY_CHANGE
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::KEYMAP_STATE
}

/// Mask selected by the bridge when the window is created.
pub fn bridge_event_mask() -> EventMask {
    toolkit_event_mask() | EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE
}

/// A visual the server offers, with the alpha mask of its RENDER format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisualCandidate {
    pub visual: Visualid,
    pub depth: u8,
    pub true_color: bool,
    pub bits_per_rgb: u8,
    pub alpha_mask: u16,
}

/// Enumerate all visuals of a screen joined with their RENDER picture format.
pub fn visual_candidates<C: Connection>(
    conn: &C,
    screen_num: usize,
) -> Result<Vec<VisualCandidate>, ReplyError> {
    let formats = conn.render_query_pict_formats()?.reply()?;
    let screen = &conn.setup().roots[screen_num];

    let alpha_mask_of = |visual: Visualid| -> u16 {
        formats
            .screens
            .get(screen_num)
            .into_iter()
            .flat_map(|s| s.depths.iter())
            .flat_map(|d| d.visuals.iter())
            .find(|v| v.visual == visual)
            .and_then(|v| formats.formats.iter().find(|f| f.id == v.format))
            .map(|f| f.direct.alpha_mask)
            .unwrap_or(0)
    };

    let mut candidates = Vec::new();
    for depth in &screen.allowed_depths {
        for visual in &depth.visuals {
            candidates.push(VisualCandidate {
                visual: visual.visual_id,
                depth: depth.depth,
                true_color: visual.class == VisualClass::TRUE_COLOR,
                bits_per_rgb: visual.bits_per_rgb_value,
                alpha_mask: alpha_mask_of(visual.visual_id),
            });
        }
    }
    Ok(candidates)
}

/// Pick the first 32-bit TrueColor visual with 8 bits per channel and alpha.
pub fn select_visual(candidates: &[VisualCandidate]) -> Option<VisualCandidate> {
    candidates.iter().copied().find(|c| {
        c.true_color && c.depth == 32 && c.bits_per_rgb == 8 && c.alpha_mask > 0
    })
}

/// Map 0.0..=1.0 onto the full `_NET_WM_WINDOW_OPACITY` range.
pub fn opacity_to_cardinal(opacity: f64) -> u32 {
    (u32::MAX as f64 * opacity.clamp(0.0, 1.0)) as u32
}

pub fn set_title<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    window: Window,
    title: &str,
) -> Result<(), ConnectionError> {
    conn.change_property8(
        PropMode::REPLACE,
        window,
        AtomEnum::WM_NAME,
        AtomEnum::STRING,
        title.as_bytes(),
    )?;
    conn.change_property8(
        PropMode::REPLACE,
        window,
        atoms._NET_WM_NAME,
        atoms.UTF8_STRING,
        title.as_bytes(),
    )?;
    Ok(())
}

/// Ask the WM to send a protocol message instead of killing the client.
pub fn set_delete_protocol<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    window: Window,
) -> Result<(), ConnectionError> {
    conn.change_property32(
        PropMode::REPLACE,
        window,
        atoms.WM_PROTOCOLS,
        AtomEnum::ATOM,
        &[atoms.WM_DELETE_WINDOW],
    )?;
    Ok(())
}

pub fn set_opacity<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    window: Window,
    opacity: f64,
) -> Result<(), ConnectionError> {
    conn.change_property32(
        PropMode::REPLACE,
        window,
        atoms._NET_WM_WINDOW_OPACITY,
        AtomEnum::CARDINAL,
        &[opacity_to_cardinal(opacity)],
    )?;
    Ok(())
}

/// Drop WM decorations (matters once the WM sees the window at all).
pub fn set_borderless<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    window: Window,
) -> Result<(), ConnectionError> {
    conn.change_property32(
        PropMode::REPLACE,
        window,
        atoms._MOTIF_WM_HINTS,
        atoms._MOTIF_WM_HINTS,
        &[MOTIF_HINTS_DECORATIONS, 0, 0, 0, 0],
    )?;
    Ok(())
}

pub fn set_always_on_top<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    window: Window,
) -> Result<(), ConnectionError> {
    conn.change_property32(
        PropMode::REPLACE,
        window,
        atoms._NET_WM_STATE,
        AtomEnum::ATOM,
        &[atoms._NET_WM_STATE_ABOVE],
    )?;
    Ok(())
}

/// Empty input shape: pointer events fall through to whatever is below.
pub fn set_click_through<C: Connection>(conn: &C, window: Window) -> Result<(), ConnectionError> {
    conn.shape_rectangles(
        shape::SO::SET,
        shape::SK::INPUT,
        ClipOrdering::UNSORTED,
        window,
        0,
        0,
        &[],
    )?;
    Ok(())
}

/// Best-effort fullscreen request through the root window.
pub fn request_fullscreen<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    root: Window,
    window: Window,
) -> Result<(), ConnectionError> {
    let event = ClientMessageEvent::new(
        32,
        window,
        atoms._NET_WM_STATE,
        [NET_WM_STATE_ADD, atoms._NET_WM_STATE_FULLSCREEN, 0, 0, 0],
    );
    conn.send_event(
        false,
        root,
        EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
        event,
    )?;
    Ok(())
}

/// Reduce an X event to what the merger cares about.
pub fn to_native(event: Event) -> NativeEvent {
    match event {
        Event::ButtonPress(e) => NativeEvent::ButtonPress {
            button: e.detail,
            x: e.event_x,
            y: e.event_y,
        },
        Event::ButtonRelease(e) => NativeEvent::ButtonRelease {
            button: e.detail,
            x: e.event_x,
            y: e.event_y,
        },
        Event::ClientMessage(e) => NativeEvent::ClientMessage {
            message_type: e.type_,
            data0: e.data.as_data32()[0],
        },
        Event::Error(e) => {
            log::warn!("X11 error on bridge connection: {:?}", e);
            NativeEvent::Other
        }
        _ => NativeEvent::Other,
    }
}

/// Bridge connection as a bounded [`NativeEventSource`].
pub struct X11EventSource<'a, C: Connection> {
    conn: &'a C,
    backlog: &'a mut VecDeque<NativeEvent>,
}

impl<'a, C: Connection> X11EventSource<'a, C> {
    pub fn new(conn: &'a C, backlog: &'a mut VecDeque<NativeEvent>) -> Self {
        Self { conn, backlog }
    }
}

impl<C: Connection> NativeEventSource for X11EventSource<'_, C> {
    fn pending(&mut self) -> usize {
        while self.backlog.len() < MAX_DRAIN {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => self.backlog.push_back(to_native(event)),
                Ok(None) => break,
                Err(e) => {
                    log::error!("Failed to read X11 events: {}", e);
                    self.backlog.push_back(NativeEvent::ConnectionLost);
                    break;
                }
            }
        }
        self.backlog.len()
    }

    fn next_event(&mut self) -> Option<NativeEvent> {
        self.backlog.pop_front()
    }
}
