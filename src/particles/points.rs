//! Sprite pass drawing one soft, additive quad per particle.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    particles::{
        fbo::PingPong,
        simulation::{state_bind_groups, state_layout},
    },
    pipelines::basic::{DepthMode, mk_render_pipeline},
    render::Points,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteUniform {
    /// rgb plus overall opacity
    pub color: [f32; 4],
    pub viewport: [f32; 2],
    pub point_size: f32,
    pub attenuate: u32,
}

const UV_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &[wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2,
    }],
};

/// Colour is scaled by alpha and added to the target, alpha accumulates.
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// On-screen diameter in pixels of a sprite `depth` units in front of the
/// camera, as computed by the sprite shader.
///
/// `focal` is the projection's vertical focal length (`proj[1][1]`, the
/// cotangent of half the vertical field of view). Without attenuation
/// `point_size` already is the pixel diameter.
pub fn sprite_diameter(point_size: f32, attenuate: bool, focal: f32, viewport_height: f32, depth: f32) -> f32 {
    if !attenuate {
        return point_size;
    }
    point_size * focal * viewport_height * 0.5 / depth.max(0.001)
}

#[derive(Debug)]
pub struct SpritePass {
    pipeline: wgpu::RenderPipeline,
    pub(crate) uniform: SpriteUniform,
    buffer: wgpu::Buffer,
    uv_grid: wgpu::Buffer,
    bind_groups: PingPong<wgpu::BindGroup>,
    count: u32,
}

impl SpritePass {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        targets: &PingPong<Texture>,
        uv_grid: &[[f32; 2]],
        uniform: SpriteUniform,
    ) -> Self {
        let layout = state_layout(device, "sprite_bind_group_layout");
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uv_grid_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle UV Grid"),
            contents: bytemuck::cast_slice(uv_grid),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let bind_groups = state_bind_groups(device, &layout, targets, &buffer, "sprite_bind_group");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&layout, camera_bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/points.wgsl").into()),
        };
        let pipeline = mk_render_pipeline(
            device,
            "Sprite Pipeline",
            &pipeline_layout,
            config.format,
            Some(ADDITIVE),
            Some(DepthMode::test_only()),
            None,
            &[UV_LAYOUT],
            shader,
        );

        Self {
            pipeline,
            uniform,
            buffer,
            uv_grid: uv_grid_buffer,
            bind_groups,
            count: uv_grid.len() as u32,
        }
    }

    pub fn write_uniform(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }

    pub fn swap(&mut self) {
        self.bind_groups.swap();
    }

    pub fn reset(&mut self) {
        self.bind_groups.reset();
    }

    pub fn points(&self) -> Points<'_> {
        Points {
            pipeline: &self.pipeline,
            bind_group: self.bind_groups.read(),
            uv_grid: &self.uv_grid,
            count: self.count,
        }
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
        self.uv_grid.destroy();
    }
}
