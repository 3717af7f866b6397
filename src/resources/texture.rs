use std::io::{BufReader, Cursor};

use anyhow::Context as _;

use crate::{
    data_structures::{model, texture},
    resources::AssetRoot,
};

/// Bind group layout of a [`model::Material`]: diffuse texture and its sampler.
pub fn diffuse_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Model texture_bind_group_layout"),
    })
}

/// Solid texture for materials that only define a colour.
pub fn solid_from_rgb(rgb: [f32; 3], device: &wgpu::Device, queue: &wgpu::Queue) -> texture::Texture {
    let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    texture::Texture::create_solid([to_u8(rgb[0]), to_u8(rgb[1]), to_u8(rgb[2]), 255], 1, 1, device, queue)
}

impl AssetRoot {
    pub async fn load_texture(
        &self,
        file_name: &str,
        is_linear: bool,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: Option<&str>,
    ) -> anyhow::Result<texture::Texture> {
        let data = self.load_binary(file_name).await?;
        texture::Texture::from_bytes(device, queue, &data, file_name, format, is_linear)
    }

    /// Parse an OBJ file and turn its MTL materials into GPU materials.
    ///
    /// A missing MTL file is not fatal: the model then gets one white material.
    pub(crate) async fn load_obj_with_materials(
        &self,
        file_name: &str,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
    ) -> anyhow::Result<(Vec<model::Material>, Vec<tobj::Model>)> {
        let obj_text: String = self.load_string(file_name).await?;
        let mut obj_reader = BufReader::new(Cursor::new(obj_text));

        let (models, obj_materials) = tobj::load_obj_buf_async(
            &mut obj_reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |p| {
                let root = self.clone();
                async move {
                    match root.load_string(&p).await {
                        Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                        Err(e) => {
                            log::warn!("Material library {p} could not be loaded: {e:#}");
                            Err(tobj::LoadError::OpenFileFailed)
                        }
                    }
                }
            },
        )
        .await
        .with_context(|| format!("could not parse {file_name}"))?;

        let obj_materials = obj_materials.unwrap_or_else(|e| {
            log::warn!("{file_name} has no usable materials ({e}), falling back to white");
            Vec::new()
        });

        let mut materials = Vec::new();
        for m in obj_materials {
            let diffuse_texture = match &m.diffuse_texture {
                Some(diffuse) => self.load_texture(diffuse, false, device, queue, None).await?,
                None => solid_from_rgb(m.diffuse.unwrap_or([1.0; 3]), device, queue),
            };
            materials.push(model::Material::new(device, &m.name, diffuse_texture, layout));
        }
        if materials.is_empty() {
            materials.push(model::Material::new(
                device,
                "default",
                solid_from_rgb([1.0; 3], device, queue),
                layout,
            ));
        }
        Ok((materials, models))
    }
}
