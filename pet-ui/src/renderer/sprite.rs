//! Sprite pipeline: copies a sub-rectangle of a sheet onto the window

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, Queue, RenderPass, RenderPipeline, Sampler,
    TextureFormat,
};

use crate::geometry::Rect;
use crate::sheet::SpriteSheet;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    tex_coords: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

// Unit quad, scaled and moved by the uniforms
const VERTICES: &[Vertex] = &[
    Vertex {
        position: [-1.0, -1.0],
        tex_coords: [0.0, 1.0],
    },
    Vertex {
        position: [1.0, -1.0],
        tex_coords: [1.0, 1.0],
    },
    Vertex {
        position: [1.0, 1.0],
        tex_coords: [1.0, 0.0],
    },
    Vertex {
        position: [-1.0, 1.0],
        tex_coords: [0.0, 0.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct Uniforms {
    /// Center of the destination in NDC
    dst_offset: [f32; 2],
    /// Half extent of the destination in NDC
    dst_size: [f32; 2],
    /// Top-left of the source rect in normalized texture coordinates
    uv_offset: [f32; 2],
    /// Size of the source rect in normalized texture coordinates
    uv_size: [f32; 2],
    flip: f32,
    _padding: [f32; 3],
}

impl Uniforms {
    /// Uniforms for copying `src` of a `sheet_size` texture into `dst` of a
    /// `viewport` sized target.
    pub(crate) fn for_copy(
        src: Rect,
        dst: Rect,
        sheet_size: (u32, u32),
        viewport: (u32, u32),
        flip_horizontal: bool,
    ) -> Self {
        let (vw, vh) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
        let (sw, sh) = (sheet_size.0.max(1) as f32, sheet_size.1.max(1) as f32);

        let center_x = (dst.x as f32 + dst.width as f32 / 2.0) / vw * 2.0 - 1.0;
        let center_y = 1.0 - (dst.y as f32 + dst.height as f32 / 2.0) / vh * 2.0;

        Self {
            dst_offset: [center_x, center_y],
            dst_size: [dst.width as f32 / vw, dst.height as f32 / vh],
            uv_offset: [src.x as f32 / sw, src.y as f32 / sh],
            uv_size: [src.width as f32 / sw, src.height as f32 / sh],
            flip: if flip_horizontal { 1.0 } else { 0.0 },
            _padding: [0.0; 3],
        }
    }
}

/// What a draw slot needs before it can be used for a sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotUpdate {
    /// No slot yet: allocate buffer and bind group.
    Create,
    /// Slot bound to another sheet: rebuild the bind group.
    Rebind,
    /// Same sheet: only the uniforms change.
    Write,
}

fn slot_update(bound_sheet: Option<u64>, sheet_id: u64) -> SlotUpdate {
    match bound_sheet {
        None => SlotUpdate::Create,
        Some(id) if id == sheet_id => SlotUpdate::Write,
        Some(_) => SlotUpdate::Rebind,
    }
}

/// Uniform buffer and bind group reused by the n-th copy of every frame.
struct DrawSlot {
    uniform_buffer: Buffer,
    bind_group: BindGroup,
    sheet_id: u64,
}

pub struct SpritePipeline {
    pipeline: RenderPipeline,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    slots: Vec<DrawSlot>,
}

impl SpritePipeline {
    pub fn new(device: &Device, format: TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("sprite.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Bind Group Layout"),
            entries: &[
                // Sheet texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Vertex Buffer"),
            contents: bytemuck::cast_slice(VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Index Buffer"),
            contents: bytemuck::cast_slice(INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        // Pixel art: no smoothing between texels
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            bind_group_layout,
            sampler,
            slots: Vec::new(),
        }
    }

    /// Set up draw slot `slot` for copying `src` of `sheet` into `dst`.
    ///
    /// Slots are reused across frames: the uniforms are rewritten in place and
    /// the bind group is only rebuilt when the slot switches sheets.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare_copy(
        &mut self,
        device: &Device,
        queue: &Queue,
        slot: usize,
        sheet: &SpriteSheet,
        src: Rect,
        dst: Rect,
        flip_horizontal: bool,
        viewport: (u32, u32),
    ) {
        let uniforms = Uniforms::for_copy(src, dst, sheet.dimensions(), viewport, flip_horizontal);

        match slot_update(self.slots.get(slot).map(|s| s.sheet_id), sheet.id()) {
            SlotUpdate::Write => {}
            SlotUpdate::Rebind => {
                let bind_group =
                    self.create_bind_group(device, sheet, &self.slots[slot].uniform_buffer);
                let draw = &mut self.slots[slot];
                draw.bind_group = bind_group;
                draw.sheet_id = sheet.id();
            }
            SlotUpdate::Create => {
                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Sprite Uniform Buffer"),
                    size: std::mem::size_of::<Uniforms>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = self.create_bind_group(device, sheet, &uniform_buffer);
                self.slots.push(DrawSlot {
                    uniform_buffer,
                    bind_group,
                    sheet_id: sheet.id(),
                });
            }
        }

        if let Some(draw) = self.slots.get(slot) {
            queue.write_buffer(&draw.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }
    }

    fn create_bind_group(
        &self,
        device: &Device,
        sheet: &SpriteSheet,
        uniform_buffer: &Buffer,
    ) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(sheet.texture_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Record the copy prepared in `slot` into the pass.
    pub fn render<'a>(&'a self, render_pass: &mut RenderPass<'a>, slot: usize) {
        let Some(draw) = self.slots.get(slot) else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &draw.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..6, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_fills_viewport_when_dst_matches() {
        let u = Uniforms::for_copy(
            Rect::new(64, 192, 32, 32),
            Rect::new(0, 0, 32, 32),
            (256, 256),
            (32, 32),
            false,
        );
        assert_eq!(u.dst_offset, [0.0, 0.0]);
        assert_eq!(u.dst_size, [1.0, 1.0]);
        assert_eq!(u.uv_offset, [0.25, 0.75]);
        assert_eq!(u.uv_size, [0.125, 0.125]);
        assert_eq!(u.flip, 0.0);
    }

    #[test]
    fn test_copy_into_corner_and_flip() {
        let u = Uniforms::for_copy(
            Rect::new(0, 0, 32, 32),
            Rect::new(0, 0, 32, 32),
            (256, 256),
            (64, 64),
            true,
        );
        assert_eq!(u.dst_offset, [-0.5, 0.5]);
        assert_eq!(u.dst_size, [0.5, 0.5]);
        assert_eq!(u.flip, 1.0);
    }

    #[test]
    fn test_slots_are_reused_per_sheet() {
        assert_eq!(slot_update(None, 3), SlotUpdate::Create);
        assert_eq!(slot_update(Some(3), 3), SlotUpdate::Write);
        assert_eq!(slot_update(Some(2), 3), SlotUpdate::Rebind);
    }

    #[test]
    fn test_uniform_layout_matches_shader() {
        // Four vec2 fields, flip and three padding floats.
        assert_eq!(std::mem::size_of::<Uniforms>(), 48);
    }
}
