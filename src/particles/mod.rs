//! GPU particle field evolved with FBO ping-pong.
//!
//! Particle state lives in two square `Rgba32Float` textures, one texel per
//! particle (`xyz` position, `w` visibility). Every simulated frame a
//! fullscreen pass reads one texture and writes the other, then the roles
//! swap. The sprite pass fetches positions from the texture that was written
//! last, addressed through a per-particle UV grid.
//!
//! The particle count is `size * size` and never changes after creation.

use anyhow::ensure;
use instant::Duration;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    context::InitContext,
    data_structures::texture::Texture,
    render::Render,
};

pub mod fbo;
pub mod points;
pub mod simulation;

use fbo::PingPong;
use points::{SpritePass, SpriteUniform};
use simulation::SimulationPass;

/// Appearance and motion of a particle field.
///
/// ```
/// use oor3d::particles::ParticleConfig;
///
/// let config = ParticleConfig {
///     size: 64,
///     radius: 3.0,
///     ..Default::default()
/// };
/// assert_eq!(config.count(), 4096);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleConfig {
    /// Side of the state textures; the field holds `size * size` particles.
    pub size: u32,
    /// Radius of the sphere particles are seeded in.
    pub radius: f32,
    pub amplitude: f32,
    pub frequency: f32,
    /// World-space size when `size_attenuation` is set, pixels otherwise.
    pub point_size: f32,
    pub size_attenuation: bool,
    pub color: [f32; 3],
    pub opacity: f32,
    /// Fixed RNG seed for reproducible fields.
    pub seed: Option<u64>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            size: 128,
            radius: 2.5,
            amplitude: 0.25,
            frequency: 0.35,
            point_size: 0.03,
            size_attenuation: true,
            color: [0.55, 0.75, 1.0],
            opacity: 0.8,
            seed: None,
        }
    }
}

impl ParticleConfig {
    pub fn count(&self) -> usize {
        self.size as usize * self.size as usize
    }

    fn sprite_uniform(&self, viewport: [f32; 2]) -> SpriteUniform {
        SpriteUniform {
            color: [self.color[0], self.color[1], self.color[2], self.opacity],
            viewport,
            point_size: self.point_size,
            attenuate: self.size_attenuation as u32,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// `size * size` positions uniformly distributed inside a sphere of `radius`,
/// all visible (`w = 1`).
pub fn seed_positions<R: Rng + ?Sized>(size: u32, radius: f32, rng: &mut R) -> Vec<[f32; 4]> {
    let count = size as usize * size as usize;
    (0..count)
        .map(|_| {
            // rejection sampling from the enclosing cube
            let (x, y, z) = loop {
                let x: f32 = rng.gen_range(-1.0..=1.0);
                let y: f32 = rng.gen_range(-1.0..=1.0);
                let z: f32 = rng.gen_range(-1.0..=1.0);
                if x * x + y * y + z * z <= 1.0 {
                    break (x, y, z);
                }
            };
            [x * radius, y * radius, z * radius, 1.0]
        })
        .collect()
}

/// Texel-centre UV of every particle, row-major.
pub fn uv_grid(size: u32) -> Vec<[f32; 2]> {
    let side = size as f32;
    (0..size)
        .flat_map(|y| (0..size).map(move |x| [(x as f32 + 0.5) / side, (y as f32 + 0.5) / side]))
        .collect()
}

/// CPU version of one simulation step, identical to the shader's.
pub fn drift_step(p: [f32; 4], time: f32, delta: f32, amplitude: f32, frequency: f32) -> [f32; 4] {
    let t = time * frequency;
    [
        p[0] + amplitude * delta * (t + p[1]).sin(),
        p[1] + amplitude * delta * (t + p[2]).cos(),
        p[2] + amplitude * delta * (0.8 * t + p[0]).sin(),
        p[3],
    ]
}

/// Padded row pitch and total byte size of a buffer holding a copy of a
/// `side * side` state texture.
pub fn readback_layout(side: u32) -> (u32, wgpu::BufferAddress) {
    let texel = std::mem::size_of::<[f32; 4]>() as u32;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = (side * texel).div_ceil(align) * align;
    (padded, padded as wgpu::BufferAddress * side as wgpu::BufferAddress)
}

#[derive(Debug)]
pub struct ParticleSystem {
    config: ParticleConfig,
    rng: StdRng,
    targets: PingPong<Texture>,
    simulation: SimulationPass,
    sprites: SpritePass,
    time: f32,
    steps: u64,
    disposed: bool,
}

impl ParticleSystem {
    pub fn new(ctx: &InitContext, config: ParticleConfig) -> anyhow::Result<Self> {
        let max_side = ctx.device.limits().max_texture_dimension_2d;
        ensure!(config.size > 0, "particle texture size must be positive");
        ensure!(
            config.size <= max_side,
            "particle texture size {} exceeds the device limit of {}",
            config.size,
            max_side
        );
        // the readback buffer is the largest one a field allocates
        let (_, buffer_bytes) = readback_layout(config.size);
        let max_buffer = ctx.device.limits().max_buffer_size;
        ensure!(
            buffer_bytes <= max_buffer,
            "particle texture size {} needs {} byte buffers which exceeds the device buffer limit of {}",
            config.size,
            buffer_bytes,
            max_buffer
        );

        let mut rng = config.rng();
        let targets = PingPong::from_fn(|slot| {
            Texture::create_float_target(
                &ctx.device,
                config.size,
                if slot == 0 { "particles A" } else { "particles B" },
            )
        });
        targets
            .a()
            .write_float_texels(&ctx.queue, &seed_positions(config.size, config.radius, &mut rng));

        let simulation = SimulationPass::new(&ctx.device, &targets, config.amplitude, config.frequency);
        let sprites = SpritePass::new(
            &ctx.device,
            &ctx.config,
            &ctx.camera_bind_group_layout,
            &targets,
            &uv_grid(config.size),
            config.sprite_uniform([ctx.config.width as f32, ctx.config.height as f32]),
        );
        log::info!("particle field with {} particles created", config.count());

        Ok(Self {
            config,
            rng,
            targets,
            simulation,
            sprites,
            time: 0.0,
            steps: 0,
            disposed: false,
        })
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.config.count()
    }

    /// Simulated seconds since creation or the last reset.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of simulation passes since creation or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The texture holding the latest positions.
    pub fn positions(&self) -> &Texture {
        self.targets.read()
    }

    /// Encode one simulation step and swap the targets.
    pub fn simulate(&mut self, encoder: &mut wgpu::CommandEncoder, queue: &wgpu::Queue, dt: Duration) {
        if self.disposed {
            return;
        }
        let delta = dt.as_secs_f32();
        self.time += delta;
        self.simulation
            .encode(encoder, queue, &self.targets, self.time, delta);
        self.targets.swap();
        self.simulation.swap();
        self.sprites.swap();
        self.steps += 1;
    }

    pub fn render(&self) -> Render<'_> {
        if self.disposed {
            return Render::None;
        }
        Render::Points(self.sprites.points())
    }

    /// Keep pixel-based sprite sizes correct after the surface changed.
    pub fn resize(&mut self, queue: &wgpu::Queue, width: u32, height: u32) {
        if self.disposed || width == 0 || height == 0 {
            return;
        }
        self.sprites.uniform.viewport = [width as f32, height as f32];
        self.sprites.write_uniform(queue);
    }

    /// Change colour and opacity without restarting the simulation.
    pub fn set_appearance(&mut self, queue: &wgpu::Queue, color: [f32; 3], opacity: f32) {
        self.config.color = color;
        self.config.opacity = opacity;
        self.sprites.uniform.color = [color[0], color[1], color[2], opacity];
        if !self.disposed {
            self.sprites.write_uniform(queue);
        }
    }

    /// Re-seed with a fresh distribution and start again from texture A.
    pub fn reset(&mut self, queue: &wgpu::Queue) {
        if self.disposed {
            return;
        }
        let positions = seed_positions(self.config.size, self.config.radius, &mut self.rng);
        self.targets.reset();
        self.simulation.reset();
        self.sprites.reset();
        self.targets.a().write_float_texels(queue, &positions);
        self.time = 0.0;
        self.steps = 0;
        log::debug!("particle field re-seeded");
    }

    /// Release every GPU allocation. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.targets.iter().for_each(Texture::destroy);
        self.simulation.destroy();
        self.sprites.destroy();
        self.disposed = true;
        log::debug!("particle field disposed");
    }

    /// Copy the current positions back to the CPU.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn read_positions(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> anyhow::Result<Vec<[f32; 4]>> {
        ensure!(!self.disposed, "the particle field was disposed");
        let side = self.config.size;
        let (padded, size) = readback_layout(side);
        let unpadded = side as usize * std::mem::size_of::<[f32; 4]>();

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.targets.read().texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(side),
                },
            },
            self.targets.read().texture.size(),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow::anyhow!("readback channel closed"))??;

        let data = slice.get_mapped_range();
        let positions = data
            .chunks(padded as usize)
            .flat_map(|row| bytemuck::pod_collect_to_vec::<u8, [f32; 4]>(&row[..unpadded]))
            .collect();
        drop(data);
        buffer.unmap();
        Ok(positions)
    }
}

impl Drop for ParticleSystem {
    fn drop(&mut self) {
        self.dispose();
    }
}
