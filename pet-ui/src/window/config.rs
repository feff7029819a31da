//! Window configuration types

use serde::Deserialize;

/// Configuration for creating a pet window.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title (not visible for borderless windows).
    pub title: String,
    /// Requested position in screen pixels.
    pub x: i32,
    pub y: i32,
    /// Width of the window in pixels.
    pub width: u32,
    /// Height of the window in pixels.
    pub height: u32,
    /// Ask the window manager for the fullscreen state.
    pub fullscreen: bool,
    /// Whole-window opacity (0.0 to 1.0), on top of per-pixel alpha.
    pub opacity: f64,
    /// Whether the window should always stay on top.
    pub always_on_top: bool,
    /// Whether mouse clicks should pass through the window entirely.
    pub click_through: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Pet".to_string(),
            x: 0,
            y: 0,
            width: 32,
            height: 32,
            fullscreen: false,
            opacity: 1.0,
            always_on_top: true,
            click_through: false,
        }
    }
}

impl WindowConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    pub fn with_click_through(mut self, click_through: bool) -> Self {
        self.click_through = click_through;
        self
    }
}
