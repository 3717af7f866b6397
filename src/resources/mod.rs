//! Loading of models, textures and raw files.
//!
//! Natively assets are read from `./assets/<file>`; in the browser they are
//! fetched from `<origin>/assets/<file>`. [`AssetRoot`] changes that base
//! directory, the free functions use the default one.

use anyhow::{Context as _, bail, ensure};

use crate::{
    data_structures::{model, texture::Texture},
    resources::texture::{diffuse_layout, solid_from_rgb},
};

pub mod loader;
pub mod mesh;
pub mod texture;

pub use loader::{Assets, LoadProgress, ResourceLoader};

pub const DEFAULT_ASSET_DIR: &str = "assets";

/// Base directory (native) or URL path (web) that asset names are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRoot {
    base: String,
}

impl Default for AssetRoot {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_DIR)
    }
}

impl AssetRoot {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn path(&self, file_name: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.base).join(file_name)
    }

    #[cfg(target_arch = "wasm32")]
    fn url(&self, file_name: &str) -> anyhow::Result<reqwest::Url> {
        let window = web_sys::window().context("no browser window")?;
        let origin = window
            .location()
            .origin()
            .map_err(|_| anyhow::anyhow!("the page origin is not readable"))?;
        let base = reqwest::Url::parse(&format!("{}/{}/", origin, self.base.trim_matches('/')))?;
        Ok(base.join(file_name)?)
    }

    pub async fn load_string(&self, file_name: &str) -> anyhow::Result<String> {
        #[cfg(target_arch = "wasm32")]
        let txt = {
            let url = self.url(file_name)?;
            reqwest::get(url)
                .await?
                .error_for_status()
                .with_context(|| format!("could not fetch {file_name}"))?
                .text()
                .await?
        };
        #[cfg(not(target_arch = "wasm32"))]
        let txt = {
            let path = self.path(file_name);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("could not read {}", path.display()))?
        };

        Ok(txt)
    }

    pub async fn load_binary(&self, file_name: &str) -> anyhow::Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = self.url(file_name)?;
            reqwest::get(url)
                .await?
                .error_for_status()
                .with_context(|| format!("could not fetch {file_name}"))?
                .bytes()
                .await?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = self.path(file_name);
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("could not read {}", path.display()))?
        };

        Ok(data)
    }

    pub async fn load_model_obj(
        &self,
        file_name: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> anyhow::Result<model::Model> {
        let bind_group_layout = diffuse_layout(device);

        let (materials, models) = self
            .load_obj_with_materials(file_name, queue, device, &bind_group_layout)
            .await?;
        let meshes: Vec<_> = mesh::load_meshes(&models, file_name, device)
            .into_iter()
            .enumerate()
            .filter_map(|(idx, result)| match result {
                Ok(mesh) => Some(mesh),
                Err(e) => {
                    log::warn!("Mesh at index {idx} in file {file_name} is skipped: {e:#}");
                    None
                }
            })
            .collect();
        ensure!(!meshes.is_empty(), "{file_name} contains no drawable meshes");

        Ok(model::Model { meshes, materials })
    }

    /// Load a `.gltf` or `.glb` file, flattening the node hierarchy of its
    /// default scene into one [`model::Model`].
    pub async fn load_model_gltf(
        &self,
        file_name: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> anyhow::Result<model::Model> {
        let data = self.load_binary(file_name).await?;
        let gltf = gltf::Gltf::from_slice(&data).with_context(|| format!("could not parse {file_name}"))?;

        let mut buffer_data: Vec<Vec<u8>> = Vec::new();
        for buffer in gltf.buffers() {
            match buffer.source() {
                gltf::buffer::Source::Bin => {
                    let blob = gltf
                        .blob
                        .as_deref()
                        .with_context(|| format!("{file_name} references a missing binary chunk"))?;
                    buffer_data.push(blob.to_vec());
                }
                gltf::buffer::Source::Uri(uri) => {
                    buffer_data.push(self.load_binary(&relative_to(file_name, uri)?).await?);
                }
            }
        }

        let layout = diffuse_layout(device);
        let mut materials = Vec::new();
        for material in gltf.materials() {
            let pbr = material.pbr_metallic_roughness();
            let name = material.name().unwrap_or("material").to_string();
            let diffuse_texture = match pbr.base_color_texture().map(|t| t.texture().source().source()) {
                Some(gltf::image::Source::View { view, mime_type }) => {
                    let buffer = buffer_data
                        .get(view.buffer().index())
                        .with_context(|| format!("{file_name}: image {name} points at a missing buffer"))?;
                    let bytes = buffer
                        .get(view.offset()..view.offset() + view.length())
                        .with_context(|| format!("{file_name}: image {name} exceeds its buffer"))?;
                    Texture::from_bytes(device, queue, bytes, &name, mime_type.split('/').last(), false)?
                }
                Some(gltf::image::Source::Uri { uri, mime_type }) => {
                    self.load_texture(
                        &relative_to(file_name, uri)?,
                        false,
                        device,
                        queue,
                        mime_type.and_then(|mt| mt.split('/').last()),
                    )
                    .await?
                }
                None => {
                    let [r, g, b, _] = pbr.base_color_factor();
                    solid_from_rgb([r, g, b], device, queue)
                }
            };
            materials.push(model::Material::new(device, &name, diffuse_texture, &layout));
        }
        // primitives without a material use this one
        let default_material = materials.len();
        materials.push(model::Material::new(
            device,
            "default",
            solid_from_rgb([1.0; 3], device, queue),
            &layout,
        ));

        let mut meshes = Vec::new();
        let roots: Vec<gltf::Node> = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
            Some(scene) => scene.nodes().collect(),
            None => gltf.nodes().collect(),
        };
        let identity = <cgmath::Matrix4<f32> as cgmath::SquareMatrix>::identity();
        for node in roots {
            collect_meshes(&node, identity, &buffer_data, device, default_material, &mut meshes);
        }
        ensure!(!meshes.is_empty(), "{file_name} contains no drawable meshes");

        Ok(model::Model { meshes, materials })
    }
}

fn collect_meshes(
    node: &gltf::Node,
    parent: cgmath::Matrix4<f32>,
    buffers: &[Vec<u8>],
    device: &wgpu::Device,
    default_material: usize,
    out: &mut Vec<model::Mesh>,
) {
    let transform = parent * cgmath::Matrix4::from(node.transform().matrix());
    if let Some(gltf_mesh) = node.mesh() {
        let name = gltf_mesh.name().unwrap_or("unknown_mesh");
        for primitive in gltf_mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Primitive {} of {name} is not a triangle list and is skipped", primitive.index());
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let vertices = mesh::gltf_vertices(&reader, transform);
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            let material = primitive.material().index().unwrap_or(default_material);
            match mesh::create_mesh(device, name, &vertices, &indices, material) {
                Ok(mesh) => out.push(mesh),
                Err(e) => log::warn!("{e:#}"),
            }
        }
    }
    for child in node.children() {
        collect_meshes(&child, transform, buffers, device, default_material, out);
    }
}

/// Resolve a URI found inside `file_name` relative to that file's directory.
fn relative_to(file_name: &str, uri: &str) -> anyhow::Result<String> {
    if uri.starts_with("data:") {
        bail!("{file_name} embeds a data URI; export it as .glb instead");
    }
    Ok(match file_name.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{uri}"),
        None => uri.to_string(),
    })
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    AssetRoot::default().load_string(file_name).await
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    AssetRoot::default().load_binary(file_name).await
}

pub async fn load_texture(
    file_name: &str,
    is_linear: bool,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: Option<&str>,
) -> anyhow::Result<Texture> {
    AssetRoot::default()
        .load_texture(file_name, is_linear, device, queue, format)
        .await
}

pub async fn load_model_obj(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<model::Model> {
    AssetRoot::default().load_model_obj(file_name, device, queue).await
}

pub async fn load_model_gltf(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<model::Model> {
    AssetRoot::default().load_model_gltf(file_name, device, queue).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uris_resolve_next_to_the_model() {
        assert_eq!(relative_to("hero/hero.gltf", "hero.bin").unwrap(), "hero/hero.bin");
        assert_eq!(relative_to("hero.gltf", "tex/a.png").unwrap(), "tex/a.png");
        assert!(relative_to("hero.gltf", "data:application/octet-stream;base64,AAAA").is_err());
    }
}
