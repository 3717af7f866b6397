//! Render composition and pipeline batching.
//!
//! Experiences describe what they want drawn each frame with a [`Render`]
//! value. The frame loop flattens all of them into batches so that every
//! pipeline is bound once per frame: opaque meshes first, then the additive
//! point sprites that depth-test against them.

use wgpu::RenderPass;

use crate::{
    context::Context,
    data_structures::model::{DrawModel, Model},
};

/// A model drawn `amount` times with the transforms in `instance`.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
}

/// A particle field drawn as one camera-facing quad per particle.
///
/// `bind_group` holds the position texture and the sprite parameters; the
/// camera is bound to group 1 by the frame loop.
pub struct Points<'a> {
    pub pipeline: &'a wgpu::RenderPipeline,
    pub bind_group: &'a wgpu::BindGroup,
    pub uv_grid: &'a wgpu::Buffer,
    pub count: u32,
}

/// What an experience renders in the main pass.
///
/// - `None` renders nothing
/// - `Mesh` renders an opaque instanced model
/// - `Points` renders a particle field
/// - `Composed` renders several of the above
pub enum Render<'a> {
    None,
    Mesh(Instanced<'a>),
    Points(Points<'a>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn batch(self, meshes: &mut Vec<Instanced<'a>>, points: &mut Vec<Points<'a>>) {
        match self {
            Render::Mesh(instanced) => meshes.push(instanced),
            Render::Points(p) => points.push(p),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.batch(meshes, points)),
            Render::None => (),
        }
    }
}

/// Draw the collected batches; meshes before points.
pub(crate) fn draw_batches<'a>(
    ctx: &'a Context,
    render_pass: &mut RenderPass<'_>,
    meshes: Vec<Instanced<'a>>,
    points: Vec<Points<'a>>,
) {
    if !meshes.is_empty() {
        render_pass.set_pipeline(&ctx.pipelines.mesh);
        for instanced in meshes {
            if instanced.amount == 0 || instanced.instance.size() == 0 {
                log::warn!("you attempted to render a model with zero instances");
                continue;
            }
            render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
            render_pass.draw_model_instanced(
                instanced.model,
                0..instanced.amount as u32,
                &ctx.camera.bind_group,
            );
        }
    }

    for p in points {
        if p.count == 0 {
            continue;
        }
        render_pass.set_pipeline(p.pipeline);
        render_pass.set_bind_group(0, p.bind_group, &[]);
        render_pass.set_bind_group(1, &ctx.camera.bind_group, &[]);
        render_pass.set_vertex_buffer(0, p.uv_grid.slice(..));
        render_pass.draw(0..6, 0..p.count);
    }
}
