//! Plain geometry shared by the window bridge, the renderer and apps

/// Axis-aligned rectangle in pixels, origin top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Size of the screen the pet lives on, captured once at start-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
