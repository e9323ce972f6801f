//! Base mesh supplied to the core before the simulation starts.
//!
//! Meshes carry named vertex attributes (`POSITION`, `NORMAL`), a flat index
//! list and a primitive type, mirroring what a scene-file loader hands over.
//! `MeshLibrary::with_default_sphere` provides the sphere every body is
//! instanced from.

use std::collections::HashMap;
use std::f32::consts::PI;

use crate::error::InitError;

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";

/// Radius of the base sphere; instances are scaled by `radius / BASE_MESH_RADIUS`.
pub const BASE_MESH_RADIUS: f32 = 0.5;

const DEFAULT_STACKS: u32 = 16;
const DEFAULT_SLICES: u32 = 24;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Float32,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::Float32 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    Lines,
    Points,
}

/// One named vertex attribute.
#[derive(Clone, Debug)]
pub struct VertexAttribute {
    pub data: Vec<f32>,
    /// Components per vertex.
    pub stride: u32,
    pub element: ElementType,
}

impl VertexAttribute {
    pub fn vec3(data: Vec<f32>) -> Self {
        Self { data, stride: 3, element: ElementType::Float32 }
    }

    /// Size of the attribute array in bytes.
    pub fn size(&self) -> usize {
        self.data.len() * self.element.size()
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.stride as usize
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub attributes: HashMap<String, VertexAttribute>,
    pub indices: Vec<u32>,
    pub primitive: Primitive,
}

impl Mesh {
    /// Outward-facing, counter-clockwise UV sphere centered on the origin.
    pub fn uv_sphere(name: &str, radius: f32, stacks: u32, slices: u32) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);

        let mut positions = Vec::with_capacity(((stacks + 1) * (slices + 1) * 3) as usize);
        let mut normals = Vec::with_capacity(positions.capacity());

        for stack in 0..=stacks {
            let phi = PI * stack as f32 / stacks as f32;
            for slice in 0..=slices {
                let theta = 2.0 * PI * slice as f32 / slices as f32;
                let normal = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
                positions.extend(normal.iter().map(|n| n * radius));
                normals.extend_from_slice(&normal);
            }
        }

        let row = slices + 1;
        let mut indices = Vec::new();
        for stack in 0..stacks {
            for slice in 0..slices {
                let a = stack * row + slice;
                let b = a + row;
                let c = b + 1;
                let d = a + 1;
                // Skip the triangles that collapse onto a pole.
                if stack != stacks - 1 {
                    indices.extend_from_slice(&[a, c, b]);
                }
                if stack != 0 {
                    indices.extend_from_slice(&[a, d, c]);
                }
            }
        }

        let mut attributes = HashMap::new();
        attributes.insert(POSITION.to_string(), VertexAttribute::vec3(positions));
        attributes.insert(NORMAL.to_string(), VertexAttribute::vec3(normals));

        Self {
            name: name.to_string(),
            attributes,
            indices,
            primitive: Primitive::Triangles,
        }
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.get(name)
    }

    /// Checks everything instancing and the kernels rely on.
    pub fn validate(&self) -> Result<(), InitError> {
        let invalid = |reason: String| InitError::InvalidMesh {
            name: self.name.clone(),
            reason,
        };

        if self.primitive != Primitive::Triangles {
            return Err(invalid(format!("primitive {:?} is not a triangle list", self.primitive)));
        }
        let position = self
            .attribute(POSITION)
            .ok_or_else(|| invalid("missing POSITION attribute".into()))?;
        let normal = self
            .attribute(NORMAL)
            .ok_or_else(|| invalid("missing NORMAL attribute".into()))?;

        for (label, attribute) in [(POSITION, position), (NORMAL, normal)] {
            if attribute.stride != 3 || attribute.data.len() % 3 != 0 {
                return Err(invalid(format!("{label} must hold three floats per vertex")));
            }
        }
        if position.vertex_count() != normal.vertex_count() {
            return Err(invalid("POSITION and NORMAL vertex counts differ".into()));
        }
        if position.vertex_count() == 0 {
            return Err(invalid("mesh has no vertices".into()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(invalid(format!(
                "index count {} is not a positive multiple of three",
                self.indices.len()
            )));
        }
        let vertex_count = position.vertex_count() as u32;
        if let Some(&index) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(invalid(format!("index {index} exceeds vertex count {vertex_count}")));
        }
        Ok(())
    }
}

/// Named meshes available to the core.
#[derive(Clone, Debug, Default)]
pub struct MeshLibrary {
    meshes: Vec<Mesh>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_sphere(name: &str) -> Self {
        let mut library = Self::new();
        library.insert(Mesh::uv_sphere(name, BASE_MESH_RADIUS, DEFAULT_STACKS, DEFAULT_SLICES));
        library
    }

    pub fn insert(&mut self, mesh: Mesh) {
        self.meshes.retain(|m| m.name != mesh.name);
        self.meshes.push(mesh);
    }

    pub fn get(&self, name: &str) -> Result<&Mesh, InitError> {
        self.meshes
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| InitError::MissingMesh { name: name.to_string() })
    }
}
