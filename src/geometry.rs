//! Concatenated per-body copies of the base mesh.
//!
//! Body `i` owns vertices `[i * vertices_per_body, (i + 1) * vertices_per_body)`
//! and indices `[i * indices_per_body, (i + 1) * indices_per_body)`; its indices
//! are re-homed by `i * vertices_per_body`.

use std::ops::Range;

use crate::body::PhysicalState;
use crate::error::InitError;
use crate::mesh::{Mesh, BASE_MESH_RADIUS, NORMAL, POSITION};

#[derive(Clone, Debug)]
pub struct SharedGeometry {
    /// Tightly packed xyz positions.
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    pub vertices_per_body: u32,
    pub indices_per_body: u32,
    pub body_count: u32,
}

impl SharedGeometry {
    /// Instances `mesh` once per body, scaled to its radius and moved to its center.
    pub fn instance(mesh: &Mesh, states: &[PhysicalState]) -> Result<Self, InitError> {
        mesh.validate()?;

        // validate() guarantees both attributes exist.
        let base_positions = &mesh.attributes[POSITION].data;
        let base_normals = &mesh.attributes[NORMAL].data;
        let vertices_per_body = (base_positions.len() / 3) as u32;
        let indices_per_body = mesh.indices.len() as u32;

        let total_vertices = vertices_per_body as u64 * states.len() as u64;
        if total_vertices > u32::MAX as u64 {
            return Err(InitError::InvalidMesh {
                name: mesh.name.clone(),
                reason: format!("{total_vertices} instanced vertices overflow 32-bit indices"),
            });
        }

        let mut positions = Vec::with_capacity(base_positions.len() * states.len());
        let mut normals = Vec::with_capacity(base_normals.len() * states.len());
        let mut indices = Vec::with_capacity(mesh.indices.len() * states.len());

        for (body, state) in states.iter().enumerate() {
            let scale = state.radius / BASE_MESH_RADIUS;
            for vertex in base_positions.chunks_exact(3) {
                positions.push(vertex[0] * scale + state.center[0]);
                positions.push(vertex[1] * scale + state.center[1]);
                positions.push(vertex[2] * scale + state.center[2]);
            }
            normals.extend_from_slice(base_normals);

            let offset = body as u32 * vertices_per_body;
            indices.extend(mesh.indices.iter().map(|i| i + offset));
        }

        Ok(Self {
            positions,
            normals,
            indices,
            vertices_per_body,
            indices_per_body,
            body_count: states.len() as u32,
        })
    }

    pub fn triangles_per_body(&self) -> u32 {
        self.indices_per_body / 3
    }

    pub fn total_vertices(&self) -> u32 {
        self.vertices_per_body * self.body_count
    }

    pub fn total_triangles(&self) -> u32 {
        self.triangles_per_body() * self.body_count
    }

    pub fn body_vertex_range(&self, body: usize) -> Range<usize> {
        let start = body * self.vertices_per_body as usize;
        start..start + self.vertices_per_body as usize
    }

    pub fn body_index_range(&self, body: usize) -> Range<u32> {
        let start = body as u32 * self.indices_per_body;
        start..start + self.indices_per_body
    }

    pub fn vertex(&self, index: usize) -> [f32; 3] {
        let i = index * 3;
        [self.positions[i], self.positions[i + 1], self.positions[i + 2]]
    }

    /// Body that owns a global triangle index.
    pub fn body_of_triangle(&self, triangle: u32) -> u32 {
        triangle / self.triangles_per_body()
    }
}
