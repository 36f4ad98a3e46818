//! The seam between the renderer and the graphics driver.
//!
//! Everything above this module talks to the GPU exclusively through the [`Gpu`] trait and the
//! opaque integer handles it mints. Two drivers implement it:
//!
//! - [`wgpu_backend::WgpuGpu`] drives a real device through wgpu (windowed or headless)
//! - a recording driver in the test-suite that performs no GPU work and logs every call, used to
//!   observe pass ordering, bindings and draw calls
//!
//! The API follows the shape of a classic immediate-mode driver: resources are created up front
//! and addressed by handle, a frame is a sequence of passes, and within a pass the caller binds a
//! program, uniform blocks, textures and geometry before each indexed draw.

use std::fmt;

use wgpu::naga;
use winit::dpi::PhysicalSize;

use crate::error::{Error, Result};

pub mod wgpu_backend;

macro_rules! handle {
    ($name:ident, $kind:literal) => {
        #[doc = concat!("Opaque ", $kind, " handle minted by a [`Gpu`] driver.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub const KIND: &'static str = $kind;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

handle!(TextureId, "texture");
handle!(BufferId, "buffer");
handle!(VertexArrayId, "vertex array");
handle!(FramebufferId, "framebuffer");
handle!(ShaderId, "shader");
handle!(ProgramId, "program");

/// Pixel layout of a texture. `Rgb8` mirrors a 3-channel image; drivers without a native
/// 3-channel format store it padded to four channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
}

impl TextureFormat {
    /// Maps an image channel count onto a format, defaulting to RGB for anything unexpected.
    pub fn from_channels(channels: u8) -> Self {
        match channels {
            1 => TextureFormat::R8,
            2 => TextureFormat::Rg8,
            3 => TextureFormat::Rgb8,
            4 => TextureFormat::Rgba8,
            _ => TextureFormat::Rgb8,
        }
    }

    pub fn channels(&self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

/// One float vertex attribute inside an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    /// Number of `f32` components (1 to 4).
    pub components: u32,
    /// Byte offset inside one vertex.
    pub offset: u64,
}

/// Describes how the bytes of a vertex buffer are split into shader inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point every stage source has to define.
    pub fn entry_point(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

impl ShaderStage {
    fn naga_stage(&self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

/// Parses and validates one WGSL stage and checks that it defines the stage's entry point.
///
/// Drivers call this before handing a source to the device, so a broken shader is reported as
/// [`Error::ShaderCompile`] with naga's diagnostic.
pub fn validate_wgsl(stage: ShaderStage, source: &str) -> Result<()> {
    let compile_error = |log: String| Error::ShaderCompile { stage, log };
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| compile_error(e.emit_to_string(source)))?;
    let defines_entry = module
        .entry_points
        .iter()
        .any(|entry| entry.name == stage.entry_point() && entry.stage == stage.naga_stage());
    if !defines_entry {
        return Err(compile_error(format!(
            "missing {stage} entry point `{}`",
            stage.entry_point()
        )));
    }
    Ok(())
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Where the draws of a pass land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The window surface (or its offscreen stand-in for headless drivers).
    Screen,
    Framebuffer(FramebufferId),
}

/// Uniform block slots. Shaders see `Frame` as `@group(0)` and `Draw` as `@group(1)`; texture
/// units live in `@group(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Written once per pass (camera, lights).
    Frame,
    /// Written before each draw (model matrix).
    Draw,
}

/// Largest uniform block a driver has to accept per slot.
pub const MAX_UNIFORM_BLOCK: u64 = 4096;

/// Number of texture units a draw can bind.
pub const TEXTURE_UNITS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(String),
}

/// Driver abstraction with handle-based resources and pass-scoped drawing.
///
/// Creation calls return a fresh handle only after the driver-side allocation succeeded. Handles
/// stay valid until the matching `delete_*` call. Binding calls are only meaningful between
/// [`Gpu::begin_pass`] and [`Gpu::end_pass`].
pub trait Gpu {
    /// Current pixel size of the window surface.
    fn surface_size(&self) -> PhysicalSize<u32>;
    /// Reconfigures the window surface after the window changed size.
    fn resize_surface(&mut self, size: PhysicalSize<u32>);
    /// Asks for another frame. Drivers without a window ignore it.
    fn request_redraw(&self) {}

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> Result<TextureId>;
    /// Reallocates the storage of `texture` at a new size, keeping the handle. Contents are lost.
    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) -> Result<()>;
    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)>;

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferId>;
    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertices: BufferId,
        indices: BufferId,
    ) -> Result<VertexArrayId>;

    fn create_framebuffer(&mut self) -> FramebufferId;
    fn attach_color(&mut self, framebuffer: FramebufferId, texture: TextureId) -> Result<()>;
    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId>;
    fn link_program(&mut self, shaders: &[ShaderId], layout: &VertexLayout) -> Result<ProgramId>;

    fn delete_shader(&mut self, shader: ShaderId);
    fn delete_program(&mut self, program: ProgramId);
    fn delete_textures(&mut self, textures: &[TextureId]);
    fn delete_buffers(&mut self, buffers: &[BufferId]);
    fn delete_vertex_arrays(&mut self, vertex_arrays: &[VertexArrayId]);
    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]);

    fn begin_pass(&mut self, target: RenderTarget, clear: [f32; 4]) -> Result<()>;
    fn use_program(&mut self, program: ProgramId);
    /// Fails with [`Error::UniformBlockTooLarge`] for blocks above [`MAX_UNIFORM_BLOCK`].
    fn set_uniforms(&mut self, slot: UniformSlot, data: &[u8]) -> Result<()>;
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);
    fn draw_indexed(&mut self, index_count: u32) -> Result<()>;
    /// Completes the pass. Everything drawn in it is visible to later passes.
    fn end_pass(&mut self) -> Result<()>;
    /// Shows the screen target.
    fn present(&mut self) -> Result<()>;
}
