//! Sprite sheet loading and texture management

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use thiserror::Error;
use wgpu::{Device, Queue, Texture, TextureView};

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Failed to load image: {0}")]
    ImageLoadError(#[from] image::ImageError),
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Decoded sheet pixels, available before a GPU exists.
#[derive(Clone)]
pub struct SheetData {
    pixels: RgbaImage,
}

impl SheetData {
    /// Load and decode a sheet from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let data = Self::from_bytes(&bytes)?;
        log::info!(
            "Loaded sprite sheet {} ({}x{})",
            path.display(),
            data.width(),
            data.height()
        );
        Ok(data)
    }

    /// Decode a sheet from encoded bytes (any format `image` supports).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SheetError> {
        let pixels = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self { pixels })
    }

    /// Wrap raw RGBA8 pixels. `None` if the buffer does not match the size.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, rgba).map(|pixels| Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

static NEXT_SHEET_ID: AtomicU64 = AtomicU64::new(1);

fn next_sheet_id() -> u64 {
    NEXT_SHEET_ID.fetch_add(1, Ordering::Relaxed)
}

/// A sheet uploaded to the GPU.
pub struct SpriteSheet {
    id: u64,
    // Keep texture alive - the texture_view references it
    #[allow(dead_code)]
    texture: Texture,
    texture_view: TextureView,
    width: u32,
    height: u32,
}

impl SpriteSheet {
    /// Upload decoded sheet data.
    pub fn from_data(data: &SheetData, device: &Device, queue: &Queue) -> Self {
        let (width, height) = data.dimensions();

        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Sheet Texture"),
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data.pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            id: next_sheet_id(),
            texture,
            texture_view,
            width,
            height,
        }
    }

    /// Process-unique id, used to cache bind groups per sheet.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture_view(&self) -> &TextureView {
        &self.texture_view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_sheet_dimensions() {
        let data = SheetData::from_bytes(&png_bytes(256, 224)).unwrap();
        assert_eq!(data.dimensions(), (256, 224));
        assert_eq!((data.width(), data.height()), (256, 224));
    }

    #[test]
    fn test_from_rgba_checks_buffer_size() {
        assert!(SheetData::from_rgba(2, 2, vec![0; 16]).is_some());
        assert!(SheetData::from_rgba(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SheetData::from_bytes(b"not an image"),
            Err(SheetError::ImageLoadError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            SheetData::from_path("/nonexistent/cat.png"),
            Err(SheetError::IoError(_))
        ));
    }

    #[test]
    fn test_sheet_ids_are_unique() {
        let ids: Vec<u64> = (0..16).map(|_| next_sheet_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(ids.iter().all(|&id| id != 0));
    }
}
