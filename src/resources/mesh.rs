use anyhow::ensure;
use wgpu::util::DeviceExt;

use crate::data_structures::model;

/// Upload one indexed triangle list.
///
/// Fails when an index points past the vertex list, which happens with
/// broken exports.
pub fn create_mesh(
    device: &wgpu::Device,
    name: &str,
    vertices: &[model::ModelVertex],
    indices: &[u32],
    material: usize,
) -> anyhow::Result<model::Mesh> {
    ensure!(!indices.is_empty(), "mesh {name} has no triangles");
    ensure!(
        indices.iter().all(|&i| (i as usize) < vertices.len()),
        "mesh {name} references vertices past its {} vertices",
        vertices.len()
    );

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", name)),
        contents: bytemuck::cast_slice(vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });

    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", name)),
        contents: bytemuck::cast_slice(indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    Ok(model::Mesh {
        name: name.to_string(),
        vertex_buffer,
        index_buffer,
        num_elements: indices.len() as u32,
        material,
    })
}

/// Vertices of an OBJ mesh loaded with `single_index`, so positions, texture
/// coordinates and normals share one index.
pub fn obj_vertices(mesh: &tobj::Mesh) -> Vec<model::ModelVertex> {
    (0..mesh.positions.len() / 3)
        .map(|i| model::ModelVertex {
            position: [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ],
            // OBJ has v pointing up, wgpu down
            tex_coords: [
                mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
        })
        .collect()
}

pub fn load_meshes(
    models: &[tobj::Model],
    file_name: &str,
    device: &wgpu::Device,
) -> Vec<anyhow::Result<model::Mesh>> {
    models
        .iter()
        .map(|m| {
            let name = if m.name.is_empty() { file_name } else { &m.name };
            create_mesh(
                device,
                name,
                &obj_vertices(&m.mesh),
                &m.mesh.indices,
                m.mesh.material_id.unwrap_or(0),
            )
        })
        .collect()
}

/// Vertices of a glTF primitive transformed into model space by `transform`.
pub fn gltf_vertices<'a, 's, F>(
    reader: &gltf::mesh::Reader<'a, 's, F>,
    transform: cgmath::Matrix4<f32>,
) -> Vec<model::ModelVertex>
where
    F: Clone + Fn(gltf::Buffer<'a>) -> Option<&'s [u8]>,
{
    use cgmath::{InnerSpace, Matrix, SquareMatrix};

    let normal_matrix = {
        let m = cgmath::Matrix3::from_cols(
            transform.x.truncate(),
            transform.y.truncate(),
            transform.z.truncate(),
        );
        m.invert().map(|inv| inv.transpose()).unwrap_or(m)
    };

    let mut vertices: Vec<model::ModelVertex> = reader
        .read_positions()
        .map(|positions| {
            positions
                .map(|p| {
                    let p = transform * cgmath::Vector4::new(p[0], p[1], p[2], 1.0);
                    model::ModelVertex {
                        position: [p.x, p.y, p.z],
                        ..Default::default()
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(normals) = reader.read_normals() {
        vertices.iter_mut().zip(normals).for_each(|(vertex, n)| {
            let n = normal_matrix * cgmath::Vector3::from(n);
            let n = if n.magnitude2() > 0.0 { n.normalize() } else { n };
            vertex.normal = n.into();
        });
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(vertex, uv)| vertex.tex_coords = uv);
    }
    vertices
}
