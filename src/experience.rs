//! Experiences and the frame loop that drives them.
//!
//! An [`Experience`] is a self-contained scene: it creates its GPU resources
//! from an [`InitContext`], advances its own state every frame, may encode
//! off-screen passes, and describes what it wants drawn in the main pass.
//! [`run`] opens the window (or binds the `#oor3d-canvas` element in the
//! browser), builds the GPU [`Context`], constructs every experience and then
//! drives them from redraw requests.
//!
//! # Frame order
//!
//! 1. `on_update` (every frame) and `on_tick` (every `tick_duration_millis`)
//! 2. `on_simulate`, encoded into the frame's command encoder
//! 3. one main render pass collecting every experience's `on_render`
//! 4. submit and present
//!
//! On close or exit every experience's `on_dispose` runs exactly once.

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};

#[cfg(feature = "integration-tests")]
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, InitContext},
    data_structures::texture::Texture,
    render::{Instanced, Points, draw_batches},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Id of the canvas element the web build renders into.
pub const CANVAS_ID: &str = "oor3d-canvas";

///
/// Output of the lifecycle hooks, used to hand async work and context changes
/// back to the frame loop.
///
/// `Out::FutEvent` resolves futures into custom events that are delivered
/// through `on_custom_events` later on.
///
/// `Out::FutFn` resolves futures into mutations that are applied to the
/// shared state.
///
/// `Out::Configure` changes the [`Context`], for instance the clear colour or
/// the tick duration.
///
/// `Empty` is the default when nothing needs to happen.
///
pub enum Out<S, E> {
    FutEvent(Vec<Box<dyn Future<Output = E>>>),
    FutFn(Vec<Box<dyn Future<Output = Box<dyn FnOnce(&mut S)>>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl<S, E> Default for Out<S, E> {
    fn default() -> Self {
        Self::Empty
    }
}

#[cfg(feature = "integration-tests")]
pub enum ImageTestResult {
    Passed,
    Waiting,
    Failed,
}

/// A scene participating in the frame loop.
///
/// # Lifecycle
///
/// 1. `on_init()` once after construction; the only hook with mutable access to the context
/// 2. `on_window_events()` for every winit window event
/// 3. `on_update()` every frame, `on_tick()` every `tick_duration_millis`
/// 4. `on_simulate()` every frame, before the main pass
/// 5. `on_render()` every frame
/// 6. `on_resize()` after the surface was reconfigured
/// 7. `on_dispose()` once when the loop ends
pub trait Experience<S, E> {
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<S, E>;

    /// Called every frame with the time since the previous frame.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<S, E>;

    fn on_tick(&mut self, _ctx: &Context, _state: &mut S) -> Out<S, E> {
        Out::Empty
    }

    /// Encode off-screen passes for this frame. Runs at most once per frame.
    fn on_simulate(&mut self, _ctx: &Context, _encoder: &mut wgpu::CommandEncoder, _dt: Duration) {}

    fn on_resize(&mut self, _ctx: &Context, _width: u32, _height: u32) {}

    fn on_window_events(&mut self, _ctx: &Context, _state: &mut S, _event: &WindowEvent) -> Out<S, E> {
        Out::Empty
    }

    /// Returns the event if it was not consumed so the next experience sees it.
    fn on_custom_events(&mut self, _ctx: &Context, _state: &mut S, event: E) -> Option<E> {
        Some(event)
    }

    /// What to draw in the main pass this frame.
    fn on_render(&self) -> crate::render::Render<'_>;

    /// Release GPU allocations. Called exactly once.
    fn on_dispose(&mut self, _ctx: &Context, _state: &mut S) {}

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        _ctx: &Context,
        _state: &mut S,
        _texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        Ok(ImageTestResult::Passed)
    }
}

impl<State, Event> Debug for dyn Experience<State, Event> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Experience")
    }
}

/// Builds an experience once the GPU is ready.
pub type ExperienceConstructor<S, E> = Box<
    dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn Experience<S, E>>>>>>,
>;

/// GPU context, shared state and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State: Default> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
        })
    }

    /// Reconfigure surface, depth buffer and projection. Zero sizes are
    /// ignored (minimized windows, hidden canvases).
    fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.ctx.config.width = width;
        self.ctx.config.height = height;
        self.is_surface_configured = true;
        self.ctx.projection.resize(width, height);
        self.ctx
            .surface
            .configure(&self.ctx.device, &self.ctx.config);
        self.ctx.depth_texture.destroy();
        self.ctx.depth_texture = Texture::create_depth_texture(
            &self.ctx.device,
            [self.ctx.config.width, self.ctx.config.height],
            "depth_texture",
        );
        true
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_texture(&self, extent3d: wgpu::Extent3d) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Output Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.ctx.config.format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_depth_texture(&self, extent3d: wgpu::Extent3d) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Depth Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Texture::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    /// Test images are padded so every row satisfies the copy alignment.
    #[cfg(feature = "integration-tests")]
    fn get_with_height(&self) -> (u32, u32) {
        let width = self.ctx.config.width.div_ceil(256) * 256;
        let height = self.ctx.config.height.div_ceil(256) * 256;
        (width, height)
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_3d_extent(&self) -> wgpu::Extent3d {
        let (width, height) = self.get_with_height();
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    fn render<Event>(
        &mut self,
        experiences: &mut [Box<dyn Experience<State, Event>>],
        dt: Duration,
        #[cfg(feature = "integration-tests")] async_runtime: &Runtime,
        #[cfg(feature = "integration-tests")] event_loop: &winit::event_loop::EventLoopProxy<
            ExperienceEvent<State, Event>,
        >,
    ) -> Result<(), wgpu::SurfaceError> {
        // keep the loop running
        self.ctx.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        #[cfg(not(feature = "integration-tests"))]
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        #[cfg(feature = "integration-tests")]
        let (tex, depth) = {
            let extent3d = self.get_test_3d_extent();
            let tex = self.get_test_texture(extent3d);
            let depth = self.get_test_depth_texture(extent3d);
            (tex, depth)
        };

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });

        for experience in experiences.iter_mut() {
            experience.on_simulate(&self.ctx, &mut encoder, dt);
        }

        {
            let mut render_pass: wgpu::RenderPass<'_> =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        #[cfg(feature = "integration-tests")]
                        view: &tex.create_view(&wgpu::TextureViewDescriptor::default()),
                        #[cfg(not(feature = "integration-tests"))]
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        #[cfg(feature = "integration-tests")]
                        view: &depth.create_view(&wgpu::TextureViewDescriptor::default()),
                        #[cfg(not(feature = "integration-tests"))]
                        view: &self.ctx.depth_texture.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });

            let mut meshes: Vec<Instanced> = Vec::new();
            let mut points: Vec<Points> = Vec::new();
            experiences.iter().for_each(|experience| {
                experience.on_render().batch(&mut meshes, &mut points);
            });
            draw_batches(&self.ctx, &mut render_pass, meshes, points);
        }

        #[cfg(feature = "integration-tests")]
        let output_buffer = {
            let u32_size = std::mem::size_of::<u32>() as u32;
            let (width, height) = self.get_with_height();
            let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                size: (u32_size * width * height) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                label: Some("Golden Image Readback"),
                mapped_at_creation: false,
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &output_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(u32_size * width),
                        rows_per_image: Some(height),
                    },
                },
                self.get_test_3d_extent(),
            );
            output_buffer
        };

        self.ctx.queue.submit(iter::once(encoder.finish()));

        #[cfg(feature = "integration-tests")]
        {
            use std::convert::identity;

            let fut_img = async {
                let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
                let buffer_slice = output_buffer.slice(..);
                buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                    tx.send(result).ok();
                });
                self.ctx.device.poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: Some(Duration::from_secs(3)),
                })?;
                rx.receive()
                    .await
                    .ok_or_else(|| anyhow::anyhow!("readback channel closed"))??;
                let data = buffer_slice.get_mapped_range();
                let (width, height) = self.get_with_height();
                image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(width, height, data)
                    .ok_or_else(|| anyhow::anyhow!("readback buffer is too small"))
            };
            let mut img = match async_runtime.block_on(fut_img) {
                Ok(img) => img,
                Err(e) => panic!("Golden image readback failed: {e:#}"),
            };
            let state = &mut self.state;
            let all_passed = experiences
                .iter()
                .map(|experience| experience.render_to_texture(&self.ctx, state, &mut img))
                .map(|res| match res {
                    Err(e) => panic!("{}", e),
                    Ok(ImageTestResult::Passed) => true,
                    Ok(ImageTestResult::Failed) => panic!("Assertion failed"),
                    Ok(ImageTestResult::Waiting) => false,
                })
                .all(identity);
            if all_passed && event_loop.send_event(ExperienceEvent::Exit).is_err() {
                log::error!("All assertions passed but the event loop is already closed");
            }
        }

        output.present();
        Ok(())
    }
}

pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<ExperienceEvent<State, Event>>,
    state: Option<AppState<State>>,
    experiences: Vec<Box<dyn Experience<State, Event>>>,
    // taken on the first `resumed`
    constructors: Option<Vec<ExperienceConstructor<State, Event>>>,
    last_time: Instant,
    time_since_tick: Duration,
    disposed: bool,
    error: Option<anyhow::Error>,
}

impl<State, Event> App<State, Event>
where
    State: 'static,
    Event: 'static,
{
    fn new(
        event_loop: &EventLoop<ExperienceEvent<State, Event>>,
        constructors: Vec<ExperienceConstructor<State, Event>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            state: None,
            experiences: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
            time_since_tick: Duration::from_millis(0),
            disposed: false,
            error: None,
        })
    }

    /// Run every experience's `on_dispose` unless that already happened.
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(state) = &mut self.state {
            self.experiences
                .iter_mut()
                .for_each(|experience| experience.on_dispose(&state.ctx, &mut state.state));
            log::info!("{} experiences disposed", self.experiences.len());
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("The experience loop stopped: {error:#}");
        self.error = Some(error);
        self.dispose();
        event_loop.exit();
    }
}

impl<State: Default, Event> App<State, Event> {
    fn initialized(
        &mut self,
        mut app_state: AppState<State>,
        experiences: Vec<Box<dyn Experience<State, Event>>>,
    ) {
        self.experiences = experiences;
        let size = app_state.ctx.window.inner_size();
        if app_state.resize(size.width, size.height) {
            self.experiences
                .iter_mut()
                .for_each(|e| e.on_resize(&app_state.ctx, size.width, size.height));
        }
        self.experiences.iter_mut().for_each(|experience| {
            let out = experience.on_init(&mut app_state.ctx, &mut app_state.state);
            handle_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut app_state.state,
                &mut app_state.ctx,
                self.proxy.clone(),
                out,
            );
        });
        app_state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(app_state);
    }
}

pub(crate) enum ExperienceEvent<State: 'static, Event: 'static> {
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        experiences: Vec<Box<dyn Experience<State, Event>>>,
    },
    #[allow(dead_code)]
    Failed(anyhow::Error),
    #[allow(dead_code)]
    Mut(Box<dyn FnOnce(&mut State)>),
    #[allow(dead_code)]
    Custom(Event),
    #[allow(dead_code)]
    Exit,
}

impl<State, Event> Debug for ExperienceEvent<State, Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { experiences, .. } => f
                .debug_struct("Initialized")
                .field("experiences", experiences)
                .finish(),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            Self::Mut(_) => f.write_str("Mut(|&mut State| -> {...})"),
            Self::Custom(_) => f.write_str("Custom(E)"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

impl<State: 'static + Default, Event: 'static> ApplicationHandler<ExperienceEvent<State, Event>>
    for App<State, Event>
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("OOR3D");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            match canvas {
                Some(canvas) => {
                    window_attributes =
                        window_attributes.with_canvas(Some(canvas.unchecked_into()));
                }
                None => {
                    self.fail(event_loop, anyhow::anyhow!("no element with id #{CANVAS_ID}"));
                    return;
                }
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window).await?;

            let experience_futures: Vec<_> = constructors
                .into_iter()
                // InitContext only clones the device/queue handles
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let experiences = futures::future::join_all(experience_futures)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<_>>>()?;
            anyhow::Ok((app_state, experiences))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, experiences)) => self.initialized(app_state, experiences),
                Err(e) => self.fail(event_loop, e),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, experiences)) => ExperienceEvent::Initialized { state, experiences },
                    Err(e) => ExperienceEvent::Failed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("The event loop closed during initialization");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ExperienceEvent<State, Event>) {
        match event {
            ExperienceEvent::Initialized { state, experiences } => {
                self.initialized(state, experiences);
            }
            ExperienceEvent::Failed(e) => self.fail(event_loop, e),
            ExperienceEvent::Custom(custom_event) => {
                if let Some(state) = &mut self.state {
                    let result = self
                        .experiences
                        .iter_mut()
                        .fold(Some(custom_event), |event, experience| {
                            experience.on_custom_events(&state.ctx, &mut state.state, event?)
                        });
                    if result.is_some() {
                        log::warn!("Custom event was not consumed this cycle");
                    }
                }
            }
            ExperienceEvent::Mut(fn_once) => {
                if let Some(state) = &mut self.state {
                    fn_once(&mut state.state);
                }
            }
            ExperienceEvent::Exit => {
                self.dispose();
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        self.experiences.iter_mut().for_each(|experience| {
            let out = experience.on_window_events(&state.ctx, &mut state.state, &event);
            handle_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut state.state,
                &mut state.ctx,
                self.proxy.clone(),
                out,
            );
        });

        match event {
            WindowEvent::CloseRequested => {
                self.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if state.resize(size.width, size.height) {
                    self.experiences
                        .iter_mut()
                        .for_each(|e| e.on_resize(&state.ctx, size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => {
                if self.disposed {
                    return;
                }
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                self.time_since_tick += dt;

                state.ctx.camera.update(&state.ctx.queue, &state.ctx.projection, dt);

                self.experiences.iter_mut().for_each(|experience| {
                    let out = experience.on_update(&state.ctx, &mut state.state, dt);
                    handle_output(
                        #[cfg(not(target_arch = "wasm32"))]
                        &self.async_runtime,
                        &mut state.state,
                        &mut state.ctx,
                        self.proxy.clone(),
                        out,
                    );
                });

                if self.time_since_tick >= Duration::from_millis(state.ctx.tick_duration_millis) {
                    self.experiences.iter_mut().for_each(|experience| {
                        let out = experience.on_tick(&state.ctx, &mut state.state);
                        handle_output(
                            #[cfg(not(target_arch = "wasm32"))]
                            &self.async_runtime,
                            &mut state.state,
                            &mut state.ctx,
                            self.proxy.clone(),
                            out,
                        );
                    });
                    self.time_since_tick = Duration::from_millis(0);
                }

                match state.render(
                    &mut self.experiences,
                    dt,
                    #[cfg(feature = "integration-tests")]
                    &self.async_runtime,
                    #[cfg(feature = "integration-tests")]
                    &self.proxy,
                ) {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        log::warn!("surface lost, reconfiguring at {}x{}", size.width, size.height);
                        if state.resize(size.width, size.height) {
                            self.experiences
                                .iter_mut()
                                .for_each(|e| e.on_resize(&state.ctx, size.width, size.height));
                        }
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.dispose();
    }
}

fn handle_output<State, Event>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    state: &mut State,
    ctx: &mut Context,
    proxy: winit::event_loop::EventLoopProxy<ExperienceEvent<State, Event>>,
    out: Out<State, Event>,
) {
    match out {
        // resolved events go through the event loop
        Out::FutEvent(futures) => {
            let fut =
                async move { futures::future::join_all(futures.into_iter().map(Pin::from)).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                let resolved = async_runtime.block_on(fut);
                for event in resolved {
                    if proxy.send_event(ExperienceEvent::Custom(event)).is_err() {
                        log::error!("Event loop was closed before all events could be processed");
                        break;
                    }
                }
            }

            #[cfg(target_arch = "wasm32")]
            {
                wasm_bindgen_futures::spawn_local(async move {
                    let resolved = fut.await;
                    for event in resolved {
                        if proxy.send_event(ExperienceEvent::Custom(event)).is_err() {
                            log::error!("Event loop was closed before all events could be processed");
                            break;
                        }
                    }
                });
            }
        }
        // mutate the state directly natively, through an event in the browser
        Out::FutFn(futures) => {
            let mutations: Vec<Pin<Box<dyn Future<Output = Box<dyn FnOnce(&mut State)>>>>> =
                futures.into_iter().map(Pin::from).collect();
            let fut = async move { futures::future::join_all(mutations).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                let _ = &proxy;
                let resolved: Vec<Box<dyn FnOnce(&mut State)>> = async_runtime.block_on(fut);
                resolved.into_iter().for_each(|mutation| mutation(state));
            }

            #[cfg(target_arch = "wasm32")]
            {
                let _ = &state;
                wasm_bindgen_futures::spawn_local(async move {
                    let resolved = fut.await;
                    for mutation in resolved {
                        if proxy.send_event(ExperienceEvent::Mut(mutation)).is_err() {
                            log::error!("Event loop was closed before all mutations were applied");
                            break;
                        }
                    }
                });
            }
        }
        Out::Configure(f) => f(ctx),
        Out::Empty => (),
    }
}

/// Open the window, construct all experiences and run the frame loop until
/// the window closes.
///
/// Errors from GPU setup or from a constructor end the loop and are
/// returned; they only affect the decorative layer, never the page.
pub fn run<State: 'static + Default, Event: 'static>(
    constructors: Vec<ExperienceConstructor<State, Event>>,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            eprintln!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<ExperienceEvent<State, Event>> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<ExperienceEvent<State, Event>> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(not(feature = "integration-tests"))]
    let event_loop: EventLoop<ExperienceEvent<State, Event>> = EventLoop::with_user_event().build()?;

    let mut app: App<State, Event> = App::new(&event_loop, constructors)?;

    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
