//! oor3d
//!
//! Runtime pieces of the OOR3D landing site: a GPU particle backdrop that
//! runs natively and in the browser (WebGL2 through `wasm-bindgen`), and the
//! early-access waitlist service.
//!
//! High-level modules
//! - `backdrop`: the ready-made landing page scene
//! - `camera`: camera, projection, orbit controller and uniforms
//! - `context`: window, surface, device/queue and shared pipelines
//! - `data_structures`: meshes, materials, instances, textures
//! - `experience`: the `Experience` trait and the frame loop
//! - `particles`: FBO ping-pong particle simulation and sprite rendering
//! - `pipelines`: shared render pipelines
//! - `render`: render composition for pipeline batching
//! - `resources`: asset loading (OBJ, glTF, textures) with progress callbacks
//! - `waitlist`: validation, storage and HTTP API of early-access signups
//!

pub mod backdrop;
pub mod camera;
pub mod context;
pub mod data_structures;
pub mod experience;
pub mod particles;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod waitlist;

pub use backdrop::{Backdrop, BackdropConfig, HeroModel};
pub use experience::{Experience, ExperienceConstructor, Out, run};
pub use particles::{ParticleConfig, ParticleSystem};

// Re-exports commonly used types for convenience in downstream code.
pub use winit::event::WindowEvent;
