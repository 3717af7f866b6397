//! Batched, concurrent asset loading with progress reporting.
//!
//! ```no_run
//! # async fn demo(device: &wgpu::Device, queue: &wgpu::Queue) -> anyhow::Result<()> {
//! use oor3d::resources::ResourceLoader;
//!
//! let assets = ResourceLoader::new()
//!     .gltf("hero", "hero.glb")
//!     .texture("glow", "glow.png")
//!     .on_progress(|p| log::info!("{} loaded ({:.0}%)", p.name, p.fraction() * 100.0))
//!     .load(device, queue)
//!     .await?;
//! let hero = assets.model("hero");
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use anyhow::{Context as _, bail};
use futures::{StreamExt, stream::FuturesUnordered};

use crate::{
    data_structures::{model::Model, texture::Texture},
    resources::AssetRoot,
};

/// Reported after every finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: usize,
    pub total: usize,
    /// Name of the request that just finished.
    pub name: String,
}

impl LoadProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.loaded as f32 / self.total as f32
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Texture,
    Obj,
    Gltf,
    Bytes,
    Text,
}

impl Kind {
    fn needs_gpu(self) -> bool {
        matches!(self, Kind::Texture | Kind::Obj | Kind::Gltf)
    }
}

#[derive(Debug, Clone)]
struct Request {
    name: String,
    file: String,
    kind: Kind,
}

enum Loaded {
    Texture(Texture),
    Model(Model),
    Bytes(Vec<u8>),
    Text(String),
}

/// Everything a [`ResourceLoader`] produced, addressed by request name.
#[derive(Debug, Default)]
pub struct Assets {
    textures: HashMap<String, Texture>,
    models: HashMap<String, Model>,
    bytes: HashMap<String, Vec<u8>>,
    text: HashMap<String, String>,
}

impl Assets {
    pub fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.get(name)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.bytes.get(name).map(Vec::as_slice)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }

    pub fn take_texture(&mut self, name: &str) -> Option<Texture> {
        self.textures.remove(name)
    }

    pub fn take_model(&mut self, name: &str) -> Option<Model> {
        self.models.remove(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len() + self.models.len() + self.bytes.len() + self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, name: String, loaded: Loaded) {
        match loaded {
            Loaded::Texture(t) => _ = self.textures.insert(name, t),
            Loaded::Model(m) => _ = self.models.insert(name, m),
            Loaded::Bytes(b) => _ = self.bytes.insert(name, b),
            Loaded::Text(t) => _ = self.text.insert(name, t),
        }
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&LoadProgress) + 'a>;
type ReadyFn<'a> = Box<dyn FnOnce(&Assets) + 'a>;

/// Collects asset requests and loads them all at once.
///
/// Requests run concurrently. `on_progress` is called once per finished
/// request, `on_ready` once after all of them succeeded. The first failure
/// aborts the whole batch and names the failing file.
#[derive(Default)]
pub struct ResourceLoader<'a> {
    root: AssetRoot,
    requests: Vec<Request>,
    on_progress: Option<ProgressFn<'a>>,
    on_ready: Option<ReadyFn<'a>>,
}

impl std::fmt::Debug for ResourceLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("root", &self.root)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

impl<'a> ResourceLoader<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: AssetRoot) -> Self {
        self.root = root;
        self
    }

    fn request(mut self, name: impl Into<String>, file: impl Into<String>, kind: Kind) -> Self {
        self.requests.push(Request {
            name: name.into(),
            file: file.into(),
            kind,
        });
        self
    }

    pub fn texture(self, name: impl Into<String>, file: impl Into<String>) -> Self {
        self.request(name, file, Kind::Texture)
    }

    pub fn obj(self, name: impl Into<String>, file: impl Into<String>) -> Self {
        self.request(name, file, Kind::Obj)
    }

    pub fn gltf(self, name: impl Into<String>, file: impl Into<String>) -> Self {
        self.request(name, file, Kind::Gltf)
    }

    pub fn bytes(self, name: impl Into<String>, file: impl Into<String>) -> Self {
        self.request(name, file, Kind::Bytes)
    }

    pub fn text(self, name: impl Into<String>, file: impl Into<String>) -> Self {
        self.request(name, file, Kind::Text)
    }

    pub fn on_progress(mut self, f: impl FnMut(&LoadProgress) + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_ready(mut self, f: impl FnOnce(&Assets) + 'a) -> Self {
        self.on_ready = Some(Box::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub async fn load(self, device: &wgpu::Device, queue: &wgpu::Queue) -> anyhow::Result<Assets> {
        self.run(Some((device, queue))).await
    }

    /// Load requests that need no GPU (`bytes` and `text`).
    pub async fn load_files(self) -> anyhow::Result<Assets> {
        if let Some(request) = self.requests.iter().find(|r| r.kind.needs_gpu()) {
            bail!(
                "{} ({}) needs a graphics device, use `load` instead",
                request.name,
                request.file
            );
        }
        self.run(None).await
    }

    async fn run(self, gpu: Option<(&wgpu::Device, &wgpu::Queue)>) -> anyhow::Result<Assets> {
        let Self {
            root,
            requests,
            mut on_progress,
            on_ready,
        } = self;

        let mut names = HashSet::new();
        if let Some(dup) = requests.iter().find(|r| !names.insert(r.name.as_str())) {
            bail!("asset name {} was requested twice", dup.name);
        }

        let total = requests.len();
        let root = &root;
        let mut pending: FuturesUnordered<_> = requests
            .into_iter()
            .map(|request| async move {
                let result = fetch(root, &request, gpu)
                    .await
                    .with_context(|| format!("loading {} from {} failed", request.name, request.file));
                (request.name, result)
            })
            .collect();

        let mut assets = Assets::default();
        let mut loaded = 0;
        while let Some((name, result)) = pending.next().await {
            let asset = result?;
            loaded += 1;
            log::debug!("asset {name} loaded ({loaded}/{total})");
            let progress = LoadProgress {
                loaded,
                total,
                name: name.clone(),
            };
            assets.insert(name, asset);
            if let Some(f) = on_progress.as_mut() {
                f(&progress);
            }
        }

        if let Some(f) = on_ready {
            f(&assets);
        }
        Ok(assets)
    }
}

async fn fetch(
    root: &AssetRoot,
    request: &Request,
    gpu: Option<(&wgpu::Device, &wgpu::Queue)>,
) -> anyhow::Result<Loaded> {
    let file = request.file.as_str();
    let gpu = || gpu.context("no graphics device was provided");
    Ok(match request.kind {
        Kind::Texture => {
            let (device, queue) = gpu()?;
            Loaded::Texture(root.load_texture(file, false, device, queue, None).await?)
        }
        Kind::Obj => {
            let (device, queue) = gpu()?;
            Loaded::Model(root.load_model_obj(file, device, queue).await?)
        }
        Kind::Gltf => {
            let (device, queue) = gpu()?;
            Loaded::Model(root.load_model_gltf(file, device, queue).await?)
        }
        Kind::Bytes => Loaded::Bytes(root.load_binary(file).await?),
        Kind::Text => Loaded::Text(root.load_string(file).await?),
    })
}
