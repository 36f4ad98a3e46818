//! Shader programs of the deferred renderer and the uniform blocks they read.
//!
//! - `sprite` draws textured quads into the color and normal buffers
//! - `deferred` lights the color buffer using the normal buffer
//! - `combine` copies the lit buffer to the screen
//!
//! The `#[repr(C)]` structs here mirror the WGSL declarations in `assets/` byte for byte.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    config::ShaderConfig,
    error::Result,
    gpu::{Gpu, ProgramId, ShaderStage},
    resources::{
        ResourceRegistry,
        mesh::{screen_layout, sprite_layout},
        shader::load_program,
    },
};

/// `Frame` block of the sprite program.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>) -> Self {
        Self {
            projection: projection.into(),
            view: view.into(),
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new(Matrix4::identity(), Matrix4::identity())
    }
}

/// `Draw` block of the sprite program.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
}

impl From<Matrix4<f32>> for ModelUniform {
    fn from(model: Matrix4<f32>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

/// The three linked programs a frame needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Programs {
    pub sprite: ProgramId,
    pub deferred: ProgramId,
    pub combine: ProgramId,
}

impl Programs {
    pub fn load(
        gpu: &mut dyn Gpu,
        registry: &mut ResourceRegistry,
        shaders: &ShaderConfig,
    ) -> Result<Self> {
        let sprite = load_program(
            gpu,
            registry,
            &[
                (ShaderStage::Vertex, shaders.path(&shaders.sprite_vertex)),
                (ShaderStage::Fragment, shaders.path(&shaders.sprite_fragment)),
            ],
            &sprite_layout(),
        )?;
        let deferred = load_program(
            gpu,
            registry,
            &[
                (ShaderStage::Vertex, shaders.path(&shaders.deferred_vertex)),
                (ShaderStage::Fragment, shaders.path(&shaders.deferred_fragment)),
            ],
            &screen_layout(),
        )?;
        let combine = load_program(
            gpu,
            registry,
            &[
                (ShaderStage::Vertex, shaders.path(&shaders.deferred_vertex)),
                (ShaderStage::Fragment, shaders.path(&shaders.combine_fragment)),
            ],
            &screen_layout(),
        )?;
        Ok(Self {
            sprite,
            deferred,
            combine,
        })
    }
}
