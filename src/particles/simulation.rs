//! Off-screen pass that advances particle positions by one frame.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    particles::fbo::PingPong,
    pipelines::basic::mk_render_pipeline,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimulationUniform {
    pub time: f32,
    pub delta: f32,
    pub amplitude: f32,
    pub frequency: f32,
}

/// Layout shared by the simulation and the sprite pass: the position
/// texture at binding 0 (read with `textureLoad`) and a uniform at binding 1.
pub fn state_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some(label),
    })
}

/// One bind group per state texture, so the group for the read slot can be
/// picked with the same index as the texture itself.
pub fn state_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &PingPong<Texture>,
    uniform: &wgpu::Buffer,
    label: &str,
) -> PingPong<wgpu::BindGroup> {
    PingPong::from_fn(|slot| {
        let texture = if slot == 0 { targets.a() } else { targets.b() };
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform.as_entire_binding(),
                },
            ],
            label: Some(&format!("{label} {}", if slot == 0 { "A" } else { "B" })),
        })
    })
}

#[derive(Debug)]
pub struct SimulationPass {
    pipeline: wgpu::RenderPipeline,
    pub(crate) uniform: SimulationUniform,
    buffer: wgpu::Buffer,
    bind_groups: PingPong<wgpu::BindGroup>,
}

impl SimulationPass {
    pub fn new(device: &wgpu::Device, targets: &PingPong<Texture>, amplitude: f32, frequency: f32) -> Self {
        let layout = state_layout(device, "simulation_bind_group_layout");
        let uniform = SimulationUniform {
            amplitude,
            frequency,
            ..Default::default()
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_groups = state_bind_groups(device, &layout, targets, &buffer, "simulation_bind_group");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Simulation Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some("Simulation Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/simulation.wgsl").into()),
        };
        // float targets can't blend, and the fullscreen triangle needs no depth or vertex buffers
        let pipeline = mk_render_pipeline(
            device,
            "Simulation Pipeline",
            &pipeline_layout,
            Texture::FLOAT_TARGET_FORMAT,
            None,
            None,
            None,
            &[],
            shader,
        );

        Self {
            pipeline,
            uniform,
            buffer,
            bind_groups,
        }
    }

    /// Encode one step reading `targets.read()` and writing `targets.write()`.
    ///
    /// The caller swaps the targets afterwards via [`SimulationPass::swap`].
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        targets: &PingPong<Texture>,
        time: f32,
        delta: f32,
    ) {
        debug_assert_eq!(targets.read_index(), self.bind_groups.read_index());
        self.uniform.time = time;
        self.uniform.delta = delta;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Simulation Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.write().view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.bind_groups.read(), &[]);
        pass.draw(0..3, 0..1);
    }

    pub fn swap(&mut self) {
        self.bind_groups.swap();
    }

    pub fn reset(&mut self) {
        self.bind_groups.reset();
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}
