//! GPU resource creation and lifetime tracking.
//!
//! Every resource the renderer allocates goes through a creation helper in this module or one of
//! its children, and each helper registers the new handle with the [`ResourceRegistry`] right after
//! the driver call succeeded. The registry is the only thing that ever releases them.

use crate::{
    error::Result,
    gpu::{
        BufferId, BufferKind, FramebufferId, Gpu, ProgramId, TextureDesc, TextureId, VertexArrayId,
        VertexLayout,
    },
    resources::framebuffer::Framebuffer,
};

pub mod framebuffer;
pub mod mesh;
pub mod shader;
pub mod texture;

/// Tracking lists for everything that has to be released at teardown or touched on resize.
///
/// Lists only grow while the application runs. [`release_all`](Self::release_all) drains them
/// once; later calls do nothing.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    textures: Vec<TextureId>,
    buffers: Vec<BufferId>,
    vertex_arrays: Vec<VertexArrayId>,
    framebuffers: Vec<Framebuffer>,
    programs: Vec<ProgramId>,
    released: bool,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_texture(&mut self, texture: TextureId) {
        self.textures.push(texture);
    }

    pub fn track_buffer(&mut self, buffer: BufferId) {
        self.buffers.push(buffer);
    }

    pub fn track_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.push(vertex_array);
    }

    pub fn track_framebuffer(&mut self, framebuffer: Framebuffer) {
        self.framebuffers.push(framebuffer);
    }

    pub fn track_program(&mut self, program: ProgramId) {
        self.programs.push(program);
    }

    pub fn create_texture(
        &mut self,
        gpu: &mut dyn Gpu,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId> {
        let texture = gpu.create_texture(desc, pixels)?;
        self.track_texture(texture);
        Ok(texture)
    }

    pub fn create_buffer(
        &mut self,
        gpu: &mut dyn Gpu,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<BufferId> {
        let buffer = gpu.create_buffer(kind, contents)?;
        self.track_buffer(buffer);
        Ok(buffer)
    }

    pub fn create_vertex_array(
        &mut self,
        gpu: &mut dyn Gpu,
        layout: &VertexLayout,
        vertices: BufferId,
        indices: BufferId,
    ) -> Result<VertexArrayId> {
        let vertex_array = gpu.create_vertex_array(layout, vertices, indices)?;
        self.track_vertex_array(vertex_array);
        Ok(vertex_array)
    }

    pub fn textures(&self) -> &[TextureId] {
        &self.textures
    }

    pub fn buffers(&self) -> &[BufferId] {
        &self.buffers
    }

    pub fn vertex_arrays(&self) -> &[VertexArrayId] {
        &self.vertex_arrays
    }

    pub fn framebuffers(&self) -> &[Framebuffer] {
        &self.framebuffers
    }

    pub(crate) fn framebuffers_mut(&mut self) -> &mut [Framebuffer] {
        &mut self.framebuffers
    }

    pub fn framebuffer(&self, id: FramebufferId) -> Option<&Framebuffer> {
        self.framebuffers.iter().find(|f| f.id == id)
    }

    pub fn programs(&self) -> &[ProgramId] {
        &self.programs
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Deletes every tracked resource: vertex arrays, buffers, programs, framebuffers, then
    /// textures (framebuffer color attachments included).
    pub fn release_all(&mut self, gpu: &mut dyn Gpu) {
        if self.released {
            log::warn!("resources were already released, ignoring");
            return;
        }
        self.released = true;

        let vertex_arrays = std::mem::take(&mut self.vertex_arrays);
        let buffers = std::mem::take(&mut self.buffers);
        let programs = std::mem::take(&mut self.programs);
        let framebuffers: Vec<_> = std::mem::take(&mut self.framebuffers)
            .into_iter()
            .map(|f| f.id)
            .collect();
        let textures = std::mem::take(&mut self.textures);
        log::info!(
            "releasing {} vertex arrays, {} buffers, {} programs, {} framebuffers, {} textures",
            vertex_arrays.len(),
            buffers.len(),
            programs.len(),
            framebuffers.len(),
            textures.len()
        );

        gpu.delete_vertex_arrays(&vertex_arrays);
        gpu.delete_buffers(&buffers);
        for program in programs {
            gpu.delete_program(program);
        }
        gpu.delete_framebuffers(&framebuffers);
        gpu.delete_textures(&textures);
    }
}
