//! wgpu renderer bound to a native X11 window

mod sprite;

pub use sprite::SpritePipeline;

use std::ffi::c_void;
use std::num::NonZeroU32;
use std::ptr::NonNull;

use thiserror::Error;
use wgpu::{Device, Queue, Surface, SurfaceConfiguration, TextureFormat};

use crate::geometry::Rect;
use crate::sheet::SpriteSheet;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("Failed to create wgpu adapter")]
    AdapterCreationFailed,
    #[error("Failed to request wgpu device: {0}")]
    DeviceRequestFailed(#[from] wgpu::RequestDeviceError),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),
    #[error("Surface offers no usable format")]
    SurfaceConfigFailed,
    #[error("Invalid native handle")]
    InvalidHandle,
}

/// The draw capability handed to apps each frame.
pub trait Canvas {
    /// Copy `src` of `sheet` to `dst`, mirrored horizontally if requested.
    fn draw(&mut self, sheet: &SpriteSheet, src: Rect, dst: Rect, flip_horizontal: bool);
}

/// Native handles of the XCB window the surface is created for.
#[derive(Clone, Copy, Debug)]
pub struct XcbTarget {
    pub connection: *mut c_void,
    pub screen: i32,
    pub window: u32,
    pub visual: u32,
}

pub struct Renderer {
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    config: SurfaceConfiguration,
    sprite_pipeline: SpritePipeline,
    /// Copies recorded so far in the current frame
    draw_count: usize,
}

impl Renderer {
    /// Create the GPU context for an XCB window.
    ///
    /// # Safety
    ///
    /// The connection and window in `target` must stay alive until the
    /// renderer is dropped.
    pub unsafe fn new(target: XcbTarget, width: u32, height: u32) -> Result<Self, RendererError> {
        let connection = NonNull::new(target.connection).ok_or(RendererError::InvalidHandle)?;
        let window = NonZeroU32::new(target.window).ok_or(RendererError::InvalidHandle)?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let display_handle = wgpu::rwh::RawDisplayHandle::Xcb(wgpu::rwh::XcbDisplayHandle::new(
            Some(connection),
            target.screen,
        ));
        let mut xcb_window = wgpu::rwh::XcbWindowHandle::new(window);
        xcb_window.visual_id = NonZeroU32::new(target.visual);
        let window_handle = wgpu::rwh::RawWindowHandle::Xcb(xcb_window);

        let surface = instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle: display_handle,
            raw_window_handle: window_handle,
        })?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RendererError::AdapterCreationFailed)?;

        let info = adapter.get_info();
        log::info!("Using GPU adapter '{}' ({:?})", info.name, info.backend);

        // WebGL2-level limits are the minimum API level we ask for
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("pet-ui device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(RendererError::SurfaceConfigFailed)?;

        let alpha_mode = pick_alpha_mode(&surface_caps.alpha_modes);
        if alpha_mode == wgpu::CompositeAlphaMode::Opaque {
            log::warn!("Surface does not support alpha compositing, window will be opaque");
        }

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sprite_pipeline = SpritePipeline::new(&device, surface_format);

        Ok(Self {
            device,
            queue,
            surface,
            config,
            sprite_pipeline,
            draw_count: 0,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn format(&self) -> TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigure after the surface was lost or outdated.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Clear to transparent, let `f` draw, present.
    pub fn render_frame<F>(&mut self, f: F) -> Result<(), wgpu::SurfaceError>
    where
        F: FnOnce(&mut dyn Canvas),
    {
        self.draw_count = 0;
        f(self);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for slot in 0..self.draw_count {
                self.sprite_pipeline.render(&mut render_pass, slot);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl Canvas for Renderer {
    fn draw(&mut self, sheet: &SpriteSheet, src: Rect, dst: Rect, flip_horizontal: bool) {
        self.sprite_pipeline.prepare_copy(
            &self.device,
            &self.queue,
            self.draw_count,
            sheet,
            src,
            dst,
            flip_horizontal,
            (self.config.width, self.config.height),
        );
        self.draw_count += 1;
    }
}

/// Prefer a compositing mode that keeps per-pixel alpha.
fn pick_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    [
        wgpu::CompositeAlphaMode::PreMultiplied,
        wgpu::CompositeAlphaMode::PostMultiplied,
        wgpu::CompositeAlphaMode::Inherit,
    ]
    .into_iter()
    .find(|mode| modes.contains(mode))
    .or_else(|| modes.first().copied())
    .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::CompositeAlphaMode;

    #[test]
    fn test_alpha_mode_prefers_premultiplied() {
        let modes = [
            CompositeAlphaMode::Opaque,
            CompositeAlphaMode::PostMultiplied,
            CompositeAlphaMode::PreMultiplied,
        ];
        assert_eq!(pick_alpha_mode(&modes), CompositeAlphaMode::PreMultiplied);
    }

    #[test]
    fn test_alpha_mode_falls_back_to_first() {
        assert_eq!(
            pick_alpha_mode(&[CompositeAlphaMode::Opaque]),
            CompositeAlphaMode::Opaque
        );
        assert_eq!(pick_alpha_mode(&[]), CompositeAlphaMode::Auto);
    }
}
