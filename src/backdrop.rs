//! The decorative scene drawn behind the landing page.
//!
//! A drifting particle field with an optional, slowly spinning hero model.
//! The camera orbits the origin; pressing `R` re-seeds the field.

use anyhow::bail;
use cgmath::Rotation3;
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::Key,
};

use crate::{
    camera::Camera,
    context::{Context, InitContext},
    data_structures::{instance::Instance, model::Model},
    experience::{Experience, ExperienceConstructor, Out},
    particles::{ParticleConfig, ParticleSystem},
    render::{Instanced, Render},
    resources::{AssetRoot, LoadProgress, ResourceLoader},
};

/// Longest simulation step; frames after a stall (hidden tab, breakpoint)
/// are clamped to this.
const MAX_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct HeroModel {
    /// `.obj`, `.gltf` or `.glb` file relative to the asset root.
    pub file: String,
    pub scale: f32,
    /// Radians per second around the vertical axis.
    pub spin: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackdropConfig {
    pub particles: ParticleConfig,
    pub hero: Option<HeroModel>,
    pub clear_colour: wgpu::Color,
    pub camera_distance: f32,
    /// Radians per second.
    pub orbit_speed: f32,
    pub asset_root: AssetRoot,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            particles: ParticleConfig::default(),
            hero: None,
            clear_colour: wgpu::Color {
                r: 0.01,
                g: 0.01,
                b: 0.03,
                a: 1.0,
            },
            camera_distance: 6.0,
            orbit_speed: 0.05,
            asset_root: AssetRoot::default(),
        }
    }
}

#[derive(Debug)]
struct Hero {
    model: Model,
    instance: Instance,
    instance_buffer: wgpu::Buffer,
    spin: f32,
}

#[derive(Debug)]
pub struct Backdrop {
    config: BackdropConfig,
    particles: ParticleSystem,
    hero: Option<Hero>,
}

impl Backdrop {
    pub async fn new(ctx: InitContext, config: BackdropConfig) -> anyhow::Result<Self> {
        let particles = ParticleSystem::new(&ctx, config.particles.clone())?;

        let hero = match &config.hero {
            Some(hero) => match load_hero(&ctx, &config.asset_root, hero).await {
                Ok(loaded) => Some(loaded),
                // the particle field is still worth showing without the model
                Err(e) => {
                    log::warn!("hero model unavailable: {e:#}");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            config,
            particles,
            hero,
        })
    }

    pub fn constructor<S: 'static, E: 'static>(config: BackdropConfig) -> ExperienceConstructor<S, E> {
        Box::new(move |ctx| {
            Box::pin(async move {
                let backdrop: Box<dyn Experience<S, E>> = Box::new(Backdrop::new(ctx, config).await?);
                Ok(backdrop)
            })
        })
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn has_hero(&self) -> bool {
        self.hero.is_some()
    }
}

async fn load_hero(ctx: &InitContext, root: &AssetRoot, hero: &HeroModel) -> anyhow::Result<Hero> {
    let extension = hero
        .file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let loader = ResourceLoader::new()
        .with_root(root.clone())
        .on_progress(|p: &LoadProgress| log::info!("loaded {} ({}/{})", p.name, p.loaded, p.total));
    let loader = match extension.as_str() {
        "obj" => loader.obj("hero", hero.file.as_str()),
        "gltf" | "glb" => loader.gltf("hero", hero.file.as_str()),
        other => bail!("{} has an unsupported model format {other:?}", hero.file),
    };
    let mut assets = loader.load(&ctx.device, &ctx.queue).await?;
    let Some(model) = assets.take_model("hero") else {
        bail!("{} produced no model", hero.file);
    };

    let instance = Instance {
        scale: cgmath::Vector3::new(hero.scale, hero.scale, hero.scale),
        ..Default::default()
    };
    let instance_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Hero Instance Buffer"),
        contents: bytemuck::cast_slice(&[instance.to_raw()]),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    });
    Ok(Hero {
        model,
        instance,
        instance_buffer,
        spin: hero.spin,
    })
}

impl<S, E> Experience<S, E> for Backdrop {
    fn on_init(&mut self, ctx: &mut Context, _state: &mut S) -> Out<S, E> {
        ctx.clear_colour = self.config.clear_colour;
        ctx.camera.camera = Camera::new((0.0, 0.0, self.config.camera_distance), (0.0, 0.0, 0.0));
        ctx.camera.controller.speed = self.config.orbit_speed;
        Out::Empty
    }

    fn on_update(&mut self, ctx: &Context, _state: &mut S, dt: Duration) -> Out<S, E> {
        if let Some(hero) = &mut self.hero {
            if hero.spin != 0.0 {
                hero.instance.rotation = cgmath::Quaternion::from_angle_y(cgmath::Rad(hero.spin * dt.as_secs_f32()))
                    * hero.instance.rotation;
                ctx.queue.write_buffer(
                    &hero.instance_buffer,
                    0,
                    bytemuck::cast_slice(&[hero.instance.to_raw()]),
                );
            }
        }
        Out::Empty
    }

    fn on_simulate(&mut self, ctx: &Context, encoder: &mut wgpu::CommandEncoder, dt: Duration) {
        self.particles.simulate(encoder, &ctx.queue, dt.min(MAX_STEP));
    }

    fn on_resize(&mut self, ctx: &Context, width: u32, height: u32) {
        self.particles.resize(&ctx.queue, width, height);
    }

    fn on_window_events(&mut self, ctx: &Context, _state: &mut S, event: &WindowEvent) -> Out<S, E> {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    logical_key: Key::Character(c),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        {
            if c.eq_ignore_ascii_case("r") {
                self.particles.reset(&ctx.queue);
            }
        }
        Out::Empty
    }

    fn on_render(&self) -> Render<'_> {
        let mut renders = Vec::with_capacity(2);
        if let Some(hero) = &self.hero {
            renders.push(Render::Mesh(Instanced {
                instance: &hero.instance_buffer,
                model: &hero.model,
                amount: 1,
            }));
        }
        renders.push(self.particles.render());
        Render::Composed(renders)
    }

    fn on_dispose(&mut self, _ctx: &Context, _state: &mut S) {
        self.particles.dispose();
        if let Some(hero) = self.hero.take() {
            hero.model.destroy();
            hero.instance_buffer.destroy();
        }
    }
}

/// Browser entry point: renders the default backdrop into `#oor3d-canvas`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn start_backdrop() -> Result<(), wasm_bindgen::JsValue> {
    crate::experience::run::<(), ()>(vec![Backdrop::constructor(BackdropConfig::default())])
        .map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
