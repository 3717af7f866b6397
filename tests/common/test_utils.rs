#![allow(dead_code)]

use oor3d::{
    context::{Context, InitContext},
    experience::{Experience, Out},
    render::Render,
};
#[cfg(feature = "integration-tests")]
use oor3d::experience::ImageTestResult;

pub(crate) const TEST_WIDTH: u32 = 256;
pub(crate) const TEST_HEIGHT: u32 = 256;

/// Device, queue and a surface-less configuration for tests that only need
/// GPU resources, not a window.
pub(crate) async fn headless_context() -> InitContext {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .expect("no graphics adapter available for tests");
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("test device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            ..Default::default()
        })
        .await
        .expect("could not open a test device");
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        width: TEST_WIDTH,
        height: TEST_HEIGHT,
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    let camera_bind_group_layout = oor3d::camera::mk_bind_group_layout(&device);
    InitContext {
        device,
        queue,
        config,
        camera_bind_group_layout,
    }
}

/// Frames seen by a golden image test.
#[derive(Debug, Default)]
pub(crate) struct FrameCounter(pub(crate) u32);

impl FrameCounter {
    pub(crate) fn frame(&self) -> u32 {
        self.0
    }

    pub(crate) fn progress(&mut self) {
        self.0 += 1;
    }
}

pub(crate) type Setup = Box<dyn Fn(&mut Context)>;
/// A rendered frame as read back from the GPU.
pub(crate) type Frame = image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>;
#[cfg(feature = "integration-tests")]
pub(crate) type Validate = Box<dyn Fn(&Context, &FrameCounter, &mut Frame) -> Result<ImageTestResult, anyhow::Error>>;

/// Wraps an experience under test: `setup` runs after its `on_init`,
/// `validate` inspects every rendered frame.
pub(crate) struct TestScene {
    pub(crate) inner: Box<dyn Experience<FrameCounter, ()>>,
    pub(crate) setup: Setup,
    #[cfg(feature = "integration-tests")]
    pub(crate) validate: Validate,
}

impl Experience<FrameCounter, ()> for TestScene {
    fn on_init(&mut self, ctx: &mut Context, state: &mut FrameCounter) -> Out<FrameCounter, ()> {
        let out = self.inner.on_init(ctx, state);
        (self.setup)(ctx);
        out
    }

    fn on_update(
        &mut self,
        ctx: &Context,
        state: &mut FrameCounter,
        dt: std::time::Duration,
    ) -> Out<FrameCounter, ()> {
        state.progress();
        self.inner.on_update(ctx, state, dt)
    }

    fn on_simulate(&mut self, ctx: &Context, encoder: &mut wgpu::CommandEncoder, dt: std::time::Duration) {
        self.inner.on_simulate(ctx, encoder, dt);
    }

    fn on_resize(&mut self, ctx: &Context, width: u32, height: u32) {
        self.inner.on_resize(ctx, width, height);
    }

    fn on_render(&self) -> Render<'_> {
        self.inner.on_render()
    }

    fn on_dispose(&mut self, ctx: &Context, state: &mut FrameCounter) {
        self.inner.on_dispose(ctx, state);
    }

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut FrameCounter,
        texture: &mut Frame,
    ) -> Result<ImageTestResult, anyhow::Error> {
        (self.validate)(ctx, state, texture)
    }
}

/// Renders nothing; useful to check the clear colour alone.
pub(crate) struct Empty;

impl Experience<FrameCounter, ()> for Empty {
    fn on_init(&mut self, _: &mut Context, _: &mut FrameCounter) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_update(&mut self, _: &Context, _: &mut FrameCounter, _: std::time::Duration) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_render(&self) -> Render<'_> {
        Render::None
    }
}

/// Run the frame loop with a single [`TestScene`] built by `$scene`, an
/// async closure taking the [`InitContext`], until it validates.
#[macro_export]
macro_rules! golden_image_test {
    ($scene:expr) => {{
        use oor3d::experience::{Experience, ExperienceConstructor};
        use $crate::common::test_utils::FrameCounter;

        let constructor: ExperienceConstructor<FrameCounter, ()> = Box::new(|ctx| {
            Box::pin(async move {
                let scene = ($scene)(ctx).await?;
                let scene: Box<dyn Experience<FrameCounter, ()>> = Box::new(scene);
                Ok(scene)
            })
        });

        oor3d::run(vec![constructor]).expect("Failed to run the frame loop for an integration test.");
    }};
}
