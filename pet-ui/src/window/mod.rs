//! Native transparent window bridge
//!
//! [`PetWindow`] creates an override-redirect X11 window with a 32-bit ARGB
//! visual, attaches a wgpu surface to it and adopts it into the [`Toolkit`].
//! Events are read through [`PetWindow::poll_event`], which merges the
//! bridge connection into the toolkit queue.

mod config;
pub(crate) mod platform;

pub use config::WindowConfig;
pub use platform::VisualCandidate;

use std::collections::VecDeque;

use thiserror::Error;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::properties::{WmSizeHints, WmSizeHintsSpecification};
use x11rb::protocol::xproto::{
    Colormap, ColormapAlloc, ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, StackMode,
    Window, WindowClass,
};
use x11rb::xcb_ffi::XCBConnection;

use crate::events::{EventMerger, GenericEvent, NativeEvent, WindowId};
use crate::geometry::DisplayGeometry;
use crate::renderer::{Canvas, Renderer, RendererError, XcbTarget};
use crate::toolkit::{Toolkit, ToolkitError};
use platform::{Atoms, X11EventSource};

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Could not establish a connection to the X server: {0}")]
    Connect(#[from] ConnectError),
    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("X11 request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("X11 request failed: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),
    #[error("No 32-bit TrueColor visual with an alpha channel found")]
    NoTransparentVisual,
    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),
    #[error("Toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),
}

/// A transparent, borderless, always-on-top window for the pet.
pub struct PetWindow {
    renderer: Option<Renderer>,
    toolkit: Option<Toolkit>,
    merger: EventMerger,
    backlog: VecDeque<NativeEvent>,
    window: Option<Window>,
    colormap: Option<Colormap>,
    conn: Option<XCBConnection>,
    display: DisplayGeometry,
    config: WindowConfig,
    position: (i32, i32),
}

impl PetWindow {
    /// Create the native window, its GPU context and the toolkit binding.
    pub fn new(config: WindowConfig) -> Result<Self, WindowError> {
        let (conn, screen_num) = XCBConnection::connect(None)?;
        let screen = conn.setup().roots[screen_num].clone();
        let display = DisplayGeometry::new(
            screen.width_in_pixels as u32,
            screen.height_in_pixels as u32,
        );
        log::info!(
            "Connected to X server, screen {} ({}x{})",
            screen_num,
            display.width,
            display.height
        );

        let candidates = platform::visual_candidates(&conn, screen_num)?;
        let visual =
            platform::select_visual(&candidates).ok_or(WindowError::NoTransparentVisual)?;
        log::debug!(
            "Using visual 0x{:x}, depth {}, alpha mask 0x{:x}",
            visual.visual,
            visual.depth,
            visual.alpha_mask
        );

        let atoms = Atoms::new(&conn)?.reply()?;

        let colormap = conn.generate_id()?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual.visual)?;

        // Buttons can only be selected by one client, so they stay on this connection.
        let window = conn.generate_id()?;
        let aux = CreateWindowAux::new()
            .colormap(colormap)
            .event_mask(platform::bridge_event_mask())
            .background_pixmap(x11rb::NONE)
            .border_pixel(0)
            .override_redirect(1);
        conn.create_window(
            visual.depth,
            window,
            screen.root,
            config.x as i16,
            config.y as i16,
            config.width as u16,
            config.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual.visual,
            &aux,
        )?;

        platform::set_title(&conn, &atoms, window, &config.title)?;

        let mut hints = WmSizeHints::new();
        hints.position = Some((WmSizeHintsSpecification::ProgramSpecified, config.x, config.y));
        hints.size = Some((
            WmSizeHintsSpecification::ProgramSpecified,
            config.width as i32,
            config.height as i32,
        ));
        hints.set_normal_hints(&conn, window)?;

        platform::set_delete_protocol(&conn, &atoms, window)?;
        platform::set_opacity(&conn, &atoms, window, config.opacity)?;
        platform::set_borderless(&conn, &atoms, window)?;
        if config.always_on_top {
            platform::set_always_on_top(&conn, &atoms, window)?;
        }
        if config.click_through {
            platform::set_click_through(&conn, window)?;
        }

        conn.map_window(window)?;
        if config.always_on_top {
            conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        }
        conn.flush()?;

        let target = XcbTarget {
            connection: conn.get_raw_xcb_connection() as *mut std::ffi::c_void,
            screen: screen_num as i32,
            window,
            visual: visual.visual,
        };
        // SAFETY: destroy() drops the renderer before the window and the connection.
        let renderer = unsafe { Renderer::new(target, config.width, config.height)? };

        if config.fullscreen {
            platform::request_fullscreen(&conn, &atoms, screen.root, window)?;
            conn.flush()?;
        }

        let mut toolkit = Toolkit::connect()?;
        let window_id = toolkit.adopt_foreign(window)?;
        // Adoption replaced our selection on the toolkit connection.
        toolkit.set_event_mask(window_id, platform::toolkit_event_mask())?;

        log::info!(
            "Created window 0x{:x} '{}' at ({}, {}) {}x{}",
            window,
            config.title,
            config.x,
            config.y,
            config.width,
            config.height
        );

        Ok(Self {
            renderer: Some(renderer),
            toolkit: Some(toolkit),
            merger: EventMerger::new(window_id, atoms.WM_PROTOCOLS, atoms.WM_DELETE_WINDOW),
            backlog: VecDeque::new(),
            window: Some(window),
            colormap: Some(colormap),
            conn: Some(conn),
            display,
            position: (config.x, config.y),
            config,
        })
    }

    /// Release renderer, toolkit binding, native window and connection.
    ///
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        self.renderer = None;

        if let Some(mut toolkit) = self.toolkit.take() {
            toolkit.forget(self.merger.window());
        }

        if let Some(conn) = self.conn.as_ref() {
            if let Some(window) = self.window.take() {
                if let Err(e) = conn.destroy_window(window) {
                    log::warn!("Failed to destroy window 0x{:x}: {}", window, e);
                }
            }
            if let Some(colormap) = self.colormap.take() {
                if let Err(e) = conn.free_colormap(colormap) {
                    log::warn!("Failed to free colormap 0x{:x}: {}", colormap, e);
                }
            }
            let _ = conn.flush();
        }

        self.window = None;
        self.colormap = None;
        self.backlog.clear();
        if self.conn.take().is_some() {
            log::debug!("Closed X connection");
        }
    }

    /// Move the window (screen coordinates).
    pub fn move_to(&mut self, x: i32, y: i32) -> Result<(), WindowError> {
        let (Some(conn), Some(window)) = (self.conn.as_ref(), self.window) else {
            return Ok(());
        };
        if self.position == (x, y) {
            return Ok(());
        }
        conn.configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        conn.flush()?;
        self.position = (x, y);
        Ok(())
    }

    /// Next generic event, non-blocking.
    ///
    /// Drains the bridge connection first (buttons, wheel, close requests),
    /// then returns whatever the toolkit queue yields.
    pub fn poll_event(&mut self) -> Option<GenericEvent> {
        let (Some(conn), Some(toolkit)) = (self.conn.as_ref(), self.toolkit.as_mut()) else {
            return None;
        };
        let mut source = X11EventSource::new(conn, &mut self.backlog);
        self.merger.poll_event(&mut source, toolkit)
    }

    /// Draw one frame through the renderer.
    pub fn render<F>(&mut self, f: F) -> Result<(), wgpu::SurfaceError>
    where
        F: FnOnce(&mut dyn Canvas),
    {
        match self.renderer.as_mut() {
            Some(renderer) => renderer.render_frame(f),
            None => Ok(()),
        }
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderer.as_mut()
    }

    /// Toolkit id of this window, as carried by its events.
    pub fn id(&self) -> WindowId {
        self.merger.window()
    }

    /// Native X11 window id, `None` after [`PetWindow::destroy`].
    pub fn native_window(&self) -> Option<Window> {
        self.window
    }

    pub fn display(&self) -> DisplayGeometry {
        self.display
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }
}

impl Drop for PetWindow {
    fn drop(&mut self) {
        self.destroy();
    }
}
