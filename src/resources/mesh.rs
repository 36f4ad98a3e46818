//! The two pieces of geometry every frame is drawn with.

use crate::{
    error::Result,
    gpu::{BufferKind, Gpu, VertexArrayId, VertexAttribute, VertexLayout},
    resources::ResourceRegistry,
};

/// Unit quad centred on the origin: `x, y, z, u, v` per vertex.
#[rustfmt::skip]
pub const SPRITE_VERTICES: [f32; 20] = [
     0.5,  0.5, 0.0, 1.0, 1.0,
     0.5, -0.5, 0.0, 1.0, 0.0,
    -0.5, -0.5, 0.0, 0.0, 0.0,
    -0.5,  0.5, 0.0, 0.0, 1.0,
];

/// Full-screen quad in normalized device coordinates: `x, y, u, v` per vertex.
#[rustfmt::skip]
pub const SCREEN_VERTICES: [f32; 16] = [
     1.0,  1.0, 1.0, 1.0,
     1.0, -1.0, 1.0, 0.0,
    -1.0, -1.0, 0.0, 0.0,
    -1.0,  1.0, 0.0, 1.0,
];

/// Two triangles shared by both quads.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

const F32: u64 = std::mem::size_of::<f32>() as u64;

pub fn sprite_layout() -> VertexLayout {
    VertexLayout {
        stride: 5 * F32,
        attributes: vec![
            VertexAttribute {
                location: 0,
                components: 3,
                offset: 0,
            },
            VertexAttribute {
                location: 1,
                components: 2,
                offset: 3 * F32,
            },
        ],
    }
}

pub fn screen_layout() -> VertexLayout {
    VertexLayout {
        stride: 4 * F32,
        attributes: vec![
            VertexAttribute {
                location: 0,
                components: 2,
                offset: 0,
            },
            VertexAttribute {
                location: 1,
                components: 2,
                offset: 2 * F32,
            },
        ],
    }
}

/// A vertex array over a quad and its index count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quad {
    pub vertex_array: VertexArrayId,
    pub index_count: u32,
}

impl Quad {
    fn create(
        gpu: &mut dyn Gpu,
        registry: &mut ResourceRegistry,
        vertices: &[f32],
        layout: &VertexLayout,
    ) -> Result<Self> {
        let vertex_buffer =
            registry.create_buffer(gpu, BufferKind::Vertex, bytemuck::cast_slice(vertices))?;
        let index_buffer =
            registry.create_buffer(gpu, BufferKind::Index, bytemuck::cast_slice(&QUAD_INDICES))?;
        let vertex_array = registry.create_vertex_array(gpu, layout, vertex_buffer, index_buffer)?;
        Ok(Self {
            vertex_array,
            index_count: QUAD_INDICES.len() as u32,
        })
    }

    pub fn sprite(gpu: &mut dyn Gpu, registry: &mut ResourceRegistry) -> Result<Self> {
        Self::create(gpu, registry, &SPRITE_VERTICES, &sprite_layout())
    }

    pub fn screen(gpu: &mut dyn Gpu, registry: &mut ResourceRegistry) -> Result<Self> {
        Self::create(gpu, registry, &SCREEN_VERTICES, &screen_layout())
    }
}
