//! Render pipelines shared by all experiences.
//!
//! Pipelines that belong to a single subsystem (the particle simulation and
//! the point sprites) are built by that subsystem on top of
//! [`basic::mk_render_pipeline`].

pub mod basic;

#[derive(Debug)]
pub struct Pipelines {
    /// Opaque, textured, instanced meshes.
    pub mesh: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        Self {
            mesh: basic::mk_mesh_pipeline(device, config, camera_bind_group_layout),
        }
    }
}
