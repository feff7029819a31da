//! # pet-ui
//!
//! Transparent, always-on-top X11 windows with a wgpu sprite renderer.
//!
//! ## Features
//! - Override-redirect windows on a 32-bit ARGB visual (per-pixel alpha)
//! - Borderless, always-on-top and click-through options
//! - Sprite sheet loading and sub-rectangle copies with horizontal flip
//! - A generic event queue fed from two X connections
//!
//! ## Example
//!
//! ```no_run
//! use pet_ui::{run_with_app, PetApp, PetWindow, WindowConfig};
//!
//! struct Idle;
//!
//! impl PetApp for Idle {}
//!
//! fn main() {
//!     let config = WindowConfig::default().with_size(32, 32).with_position(100, 100);
//!     let window = PetWindow::new(config).expect("Failed to create pet window");
//!     run_with_app(window, Idle);
//! }
//! ```

mod app;
pub mod events;
mod geometry;
mod renderer;
mod sheet;
pub mod toolkit;
mod window;

// Geometry
pub use geometry::{DisplayGeometry, Rect};

// Events
pub use events::{
    EventMerger, EventQueue, GenericEvent, GenericEventPump, NativeEvent, NativeEventSource,
    WheelDirection, WindowEvent, WindowId,
};
pub use toolkit::{Toolkit, ToolkitError};

// Renderer
pub use renderer::{Canvas, Renderer, RendererError, SpritePipeline, XcbTarget};

// Sprite sheets
pub use sheet::{SheetData, SheetError, SpriteSheet};

// Window
pub use window::{PetWindow, VisualCandidate, WindowConfig, WindowError};

// App loop
pub use app::{frame_interval, run_with_app, GpuResources, PetApp, WindowHost};
