//! Application trait and the frame loop that drives it

use std::time::{Duration, Instant};

use crate::events::{GenericEvent, WindowEvent};
use crate::geometry::DisplayGeometry;
use crate::renderer::Canvas;
use crate::window::PetWindow;

/// GPU resources for app initialization
pub struct GpuResources<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub format: wgpu::TextureFormat,
}

/// What an app may do with its window during `update`.
pub trait WindowHost {
    /// Move the window to screen coordinates.
    fn set_position(&mut self, x: i32, y: i32);

    fn position(&self) -> (i32, i32);

    fn size(&self) -> (u32, u32);

    fn display(&self) -> DisplayGeometry;
}

impl WindowHost for PetWindow {
    fn set_position(&mut self, x: i32, y: i32) {
        if let Err(e) = self.move_to(x, y) {
            log::warn!("Failed to move window to ({}, {}): {}", x, y, e);
        }
    }

    fn position(&self) -> (i32, i32) {
        PetWindow::position(self)
    }

    fn size(&self) -> (u32, u32) {
        PetWindow::size(self)
    }

    fn display(&self) -> DisplayGeometry {
        PetWindow::display(self)
    }
}

/// Application driven by [`run_with_app`]
pub trait PetApp {
    /// Called once when GPU resources are available (for uploading textures)
    fn init_gpu(&mut self, _gpu: GpuResources<'_>) {}

    /// Called once per frame before events are drained.
    /// `ticks` is milliseconds since the loop started.
    fn update(&mut self, _ticks: u64, _host: &mut dyn WindowHost) {}

    /// Called for every event, `Quit` included
    fn on_event(&mut self, _event: &GenericEvent) {}

    /// Called once per frame on a cleared, transparent target
    fn draw(&self, _canvas: &mut dyn Canvas) {}

    /// Return true if the app wants to quit
    fn should_quit(&self) -> bool {
        false
    }

    /// Return the target frames per second (default: 60)
    fn target_fps(&self) -> f32 {
        60.0
    }
}

/// Time budget of one frame at `fps`.
pub fn frame_interval(fps: f32) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f32(1.0 / fps)
    } else {
        Duration::ZERO
    }
}

/// Run the frame loop until a `Quit` event arrives or the app asks to stop.
///
/// Each iteration updates the app, drains all pending events, renders one
/// frame and sleeps for the rest of the frame budget. The window is
/// destroyed before returning.
pub fn run_with_app<A: PetApp>(mut window: PetWindow, mut app: A) {
    if let Some(renderer) = window.renderer() {
        app.init_gpu(GpuResources {
            device: renderer.device(),
            queue: renderer.queue(),
            format: renderer.format(),
        });
    }

    let start = Instant::now();
    let interval = frame_interval(app.target_fps());
    let mut done = false;

    while !done {
        let frame_start = Instant::now();
        let ticks = start.elapsed().as_millis() as u64;

        app.update(ticks, &mut window);

        while let Some(event) = window.poll_event() {
            match event {
                GenericEvent::Quit => done = true,
                GenericEvent::Window {
                    event: WindowEvent::Resized(width, height),
                    ..
                } => {
                    if let Some(renderer) = window.renderer_mut() {
                        renderer.resize(width, height);
                    }
                }
                _ => {}
            }
            app.on_event(&event);
        }

        if app.should_quit() {
            done = true;
        }
        if done {
            break;
        }

        if let Err(e) = window.render(|canvas| app.draw(canvas)) {
            match e {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    log::debug!("Surface {:?}, reconfiguring", e);
                    if let Some(renderer) = window.renderer_mut() {
                        renderer.reconfigure();
                    }
                }
                wgpu::SurfaceError::OutOfMemory => {
                    log::error!("Render error: {:?}", e);
                    done = true;
                }
                wgpu::SurfaceError::Timeout => {
                    log::warn!("Render error: {:?}", e);
                }
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }

    log::info!("Frame loop finished after {} ms", start.elapsed().as_millis());
    window.destroy();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        let fifty = frame_interval(50.0).as_micros();
        assert!((19_999..=20_001).contains(&fifty));
        assert!(frame_interval(60.0) > Duration::from_millis(16));
        assert!(frame_interval(60.0) < Duration::from_millis(17));
    }

    #[test]
    fn test_frame_interval_rejects_nonsense() {
        assert_eq!(frame_interval(0.0), Duration::ZERO);
        assert_eq!(frame_interval(-5.0), Duration::ZERO);
        assert_eq!(frame_interval(f32::NAN), Duration::ZERO);
    }
}
