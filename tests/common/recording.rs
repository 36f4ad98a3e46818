//! A [`Gpu`] that performs no GPU work and keeps a log of every call.
//!
//! The recording driver validates handles, pass nesting and shader sources (through naga, like
//! the wgpu driver) so that it behaves like a strict driver, which lets the render pipeline, the registry and the editor be tested
//! without an adapter. Draw calls are additionally captured together with the state that was bound
//! when they were issued, see [`RecordingGpu::passes`].

use std::collections::{HashMap, HashSet};

use winit::dpi::PhysicalSize;

use vibrant::{
    Error, Result,
    gpu::{
        BufferId, BufferKind, FramebufferId, FramebufferStatus, Gpu, MAX_UNIFORM_BLOCK, ProgramId,
        RenderTarget, ShaderId, ShaderStage, TEXTURE_UNITS, TextureDesc, TextureId, UniformSlot,
        VertexArrayId, VertexLayout, validate_wgsl,
    },
};

/// One call made against the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ResizeSurface(PhysicalSize<u32>),
    CreateTexture { id: TextureId, desc: TextureDesc },
    ResizeTexture { id: TextureId, width: u32, height: u32 },
    CreateBuffer { id: BufferId, kind: BufferKind, len: usize },
    CreateVertexArray { id: VertexArrayId, vertices: BufferId, indices: BufferId },
    CreateFramebuffer(FramebufferId),
    AttachColor { framebuffer: FramebufferId, texture: TextureId },
    CompileShader { id: ShaderId, stage: ShaderStage },
    LinkProgram { id: ProgramId, shaders: Vec<ShaderId> },
    DeleteShader(ShaderId),
    DeleteProgram(ProgramId),
    DeleteTextures(Vec<TextureId>),
    DeleteBuffers(Vec<BufferId>),
    DeleteVertexArrays(Vec<VertexArrayId>),
    DeleteFramebuffers(Vec<FramebufferId>),
    BeginPass { target: RenderTarget, clear: [f32; 4] },
    UseProgram(ProgramId),
    SetUniforms { slot: UniformSlot, data: Vec<u8> },
    BindTexture { unit: u32, texture: TextureId },
    BindVertexArray(VertexArrayId),
    DrawIndexed { index_count: u32 },
    EndPass,
    Present,
}

/// A draw call with the state that was bound when it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub textures: [Option<TextureId>; TEXTURE_UNITS as usize],
    pub frame_uniforms: Vec<u8>,
    pub draw_uniforms: Vec<u8>,
    pub index_count: u32,
}

/// A completed pass and everything drawn in it.
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    pub target: RenderTarget,
    pub clear: [f32; 4],
    pub draws: Vec<DrawCall>,
}

#[derive(Debug, Default)]
struct Bindings {
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    textures: [Option<TextureId>; TEXTURE_UNITS as usize],
    frame_uniforms: Vec<u8>,
    draw_uniforms: Vec<u8>,
}

#[derive(Debug)]
struct TextureEntry {
    desc: TextureDesc,
    pixels: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct RecordingGpu {
    surface_size: PhysicalSize<u32>,
    max_texture_size: u32,
    next_id: u32,
    commands: Vec<Command>,
    passes: Vec<PassRecord>,
    textures: HashMap<TextureId, TextureEntry>,
    buffers: HashMap<BufferId, (BufferKind, Vec<u8>)>,
    vertex_arrays: HashMap<VertexArrayId, (BufferId, BufferId)>,
    framebuffers: HashMap<FramebufferId, Option<TextureId>>,
    shaders: HashMap<ShaderId, ShaderStage>,
    programs: HashSet<ProgramId>,
    current: Option<PassRecord>,
    bindings: Bindings,
}

impl RecordingGpu {
    pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface_size: PhysicalSize::new(width, height),
            max_texture_size: Self::DEFAULT_MAX_TEXTURE_SIZE,
            next_id: 1,
            commands: Vec::new(),
            passes: Vec::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashSet::new(),
            current: None,
            bindings: Bindings::default(),
        }
    }

    /// Textures larger than `size` on either axis make a framebuffer incomplete.
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn set_max_texture_size(&mut self, size: u32) {
        self.max_texture_size = size;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Completed passes in submission order.
    pub fn passes(&self) -> &[PassRecord] {
        &self.passes
    }

    /// Forgets the recorded history, keeping all live resources.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.passes.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(|p| p.draws.len()).sum::<usize>()
            + self.current.as_ref().map_or(0, |p| p.draws.len())
    }

    pub fn present_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Present))
            .count()
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture).map(|t| &t.desc)
    }

    /// Pixels uploaded at creation, `None` for render targets or unknown handles.
    pub fn texture_pixels(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(&texture)?.pixels.as_deref()
    }

    pub fn framebuffer_color(&self, framebuffer: FramebufferId) -> Option<TextureId> {
        self.framebuffers.get(&framebuffer).copied().flatten()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, data)| data.as_slice())
    }

    /// Number of resources created and not yet deleted, shader stages included.
    pub fn live_resources(&self) -> usize {
        self.textures.len()
            + self.buffers.len()
            + self.vertex_arrays.len()
            + self.framebuffers.len()
            + self.shaders.len()
            + self.programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn in_pass(&self, call: &str) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::Backend(format!("{call} outside of a render pass")));
        }
        Ok(())
    }
}

impl Gpu for RecordingGpu {
    fn surface_size(&self) -> PhysicalSize<u32> {
        self.surface_size
    }

    fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.surface_size = size;
        self.commands.push(Command::ResizeSurface(size));
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::Backend(format!("zero-sized texture `{}`", desc.label)));
        }
        if let Some(pixels) = pixels {
            let expected = (desc.width * desc.height * desc.format.channels()) as usize;
            if pixels.len() != expected {
                return Err(Error::Backend(format!(
                    "texture `{}` expects {expected} bytes, got {}",
                    desc.label,
                    pixels.len()
                )));
            }
        }
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureEntry {
                desc: desc.clone(),
                pixels: pixels.map(<[u8]>::to_vec),
            },
        );
        self.commands.push(Command::CreateTexture {
            id,
            desc: desc.clone(),
        });
        Ok(id)
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) -> Result<()> {
        let entry = self
            .textures
            .get_mut(&texture)
            .ok_or(Error::InvalidHandle {
                kind: TextureId::KIND,
                id: texture.0,
            })?;
        entry.desc.width = width.max(1);
        entry.desc.height = height.max(1);
        entry.pixels = None;
        self.commands.push(Command::ResizeTexture {
            id: texture,
            width,
            height,
        });
        Ok(())
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .map(|t| (t.desc.width, t.desc.height))
    }

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferId> {
        let id = BufferId(self.next());
        self.buffers.insert(id, (kind, contents.to_vec()));
        self.commands.push(Command::CreateBuffer {
            id,
            kind,
            len: contents.len(),
        });
        Ok(id)
    }

    fn create_vertex_array(
        &mut self,
        _layout: &VertexLayout,
        vertices: BufferId,
        indices: BufferId,
    ) -> Result<VertexArrayId> {
        for buffer in [vertices, indices] {
            if !self.buffers.contains_key(&buffer) {
                return Err(Error::InvalidHandle {
                    kind: BufferId::KIND,
                    id: buffer.0,
                });
            }
        }
        let id = VertexArrayId(self.next());
        self.vertex_arrays.insert(id, (vertices, indices));
        self.commands.push(Command::CreateVertexArray {
            id,
            vertices,
            indices,
        });
        Ok(id)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.next());
        self.framebuffers.insert(id, None);
        self.commands.push(Command::CreateFramebuffer(id));
        id
    }

    fn attach_color(&mut self, framebuffer: FramebufferId, texture: TextureId) -> Result<()> {
        if !self.textures.contains_key(&texture) {
            return Err(Error::InvalidHandle {
                kind: TextureId::KIND,
                id: texture.0,
            });
        }
        let slot = self
            .framebuffers
            .get_mut(&framebuffer)
            .ok_or(Error::InvalidHandle {
                kind: FramebufferId::KIND,
                id: framebuffer.0,
            })?;
        *slot = Some(texture);
        self.commands.push(Command::AttachColor {
            framebuffer,
            texture,
        });
        Ok(())
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(attachment) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::Incomplete(format!("unknown {framebuffer}"));
        };
        let Some(entry) = attachment.as_ref().and_then(|t| self.textures.get(t)) else {
            return FramebufferStatus::Incomplete("missing color attachment".to_string());
        };
        let (width, height) = (entry.desc.width, entry.desc.height);
        if width > self.max_texture_size || height > self.max_texture_size {
            return FramebufferStatus::Incomplete(format!(
                "color attachment {width}x{height} exceeds the {} limit",
                self.max_texture_size
            ));
        }
        FramebufferStatus::Complete
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId> {
        validate_wgsl(stage, source)?;
        let id = ShaderId(self.next());
        self.shaders.insert(id, stage);
        self.commands.push(Command::CompileShader { id, stage });
        Ok(id)
    }

    fn link_program(&mut self, shaders: &[ShaderId], _layout: &VertexLayout) -> Result<ProgramId> {
        let mut stages = Vec::with_capacity(shaders.len());
        for shader in shaders {
            let stage = self
                .shaders
                .get(shader)
                .ok_or_else(|| Error::ShaderLink(format!("{shader} is not a compiled shader")))?;
            stages.push(*stage);
        }
        for required in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !stages.contains(&required) {
                return Err(Error::ShaderLink(format!("no {required} stage attached")));
            }
        }
        let id = ProgramId(self.next());
        self.programs.insert(id);
        self.commands.push(Command::LinkProgram {
            id,
            shaders: shaders.to_vec(),
        });
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.commands.push(Command::DeleteShader(shader));
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.commands.push(Command::DeleteProgram(program));
    }

    fn delete_textures(&mut self, textures: &[TextureId]) {
        for texture in textures {
            self.textures.remove(texture);
        }
        self.commands.push(Command::DeleteTextures(textures.to_vec()));
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) {
        for buffer in buffers {
            self.buffers.remove(buffer);
        }
        self.commands.push(Command::DeleteBuffers(buffers.to_vec()));
    }

    fn delete_vertex_arrays(&mut self, vertex_arrays: &[VertexArrayId]) {
        for vertex_array in vertex_arrays {
            self.vertex_arrays.remove(vertex_array);
        }
        self.commands
            .push(Command::DeleteVertexArrays(vertex_arrays.to_vec()));
    }

    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]) {
        for framebuffer in framebuffers {
            self.framebuffers.remove(framebuffer);
        }
        self.commands
            .push(Command::DeleteFramebuffers(framebuffers.to_vec()));
    }

    fn begin_pass(&mut self, target: RenderTarget, clear: [f32; 4]) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::Backend("render pass already in progress".to_string()));
        }
        if let RenderTarget::Framebuffer(framebuffer) = target {
            if let FramebufferStatus::Incomplete(reason) = self.framebuffer_status(framebuffer) {
                return Err(Error::FramebufferIncomplete(reason));
            }
        }
        self.bindings = Bindings::default();
        self.current = Some(PassRecord {
            target,
            clear,
            draws: Vec::new(),
        });
        self.commands.push(Command::BeginPass { target, clear });
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) {
        self.bindings.program = Some(program);
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniforms(&mut self, slot: UniformSlot, data: &[u8]) -> Result<()> {
        if data.len() as u64 > MAX_UNIFORM_BLOCK {
            return Err(Error::UniformBlockTooLarge {
                len: data.len(),
                max: MAX_UNIFORM_BLOCK,
            });
        }
        match slot {
            UniformSlot::Frame => self.bindings.frame_uniforms = data.to_vec(),
            UniformSlot::Draw => self.bindings.draw_uniforms = data.to_vec(),
        }
        self.commands.push(Command::SetUniforms {
            slot,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if let Some(slot) = self.bindings.textures.get_mut(unit as usize) {
            *slot = Some(texture);
        } else {
            log::warn!("texture unit {unit} out of range, binding ignored");
        }
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.bindings.vertex_array = Some(vertex_array);
        self.commands.push(Command::BindVertexArray(vertex_array));
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<()> {
        self.in_pass("draw")?;
        let program = self.bindings.program.ok_or_else(|| {
            Error::Backend("draw without a program in use".to_string())
        })?;
        if !self.programs.contains(&program) {
            return Err(Error::InvalidHandle {
                kind: ProgramId::KIND,
                id: program.0,
            });
        }
        let call = DrawCall {
            program: Some(program),
            vertex_array: self.bindings.vertex_array,
            textures: self.bindings.textures,
            frame_uniforms: self.bindings.frame_uniforms.clone(),
            draw_uniforms: self.bindings.draw_uniforms.clone(),
            index_count,
        };
        if let Some(pass) = self.current.as_mut() {
            pass.draws.push(call);
        }
        self.commands.push(Command::DrawIndexed { index_count });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        let pass = self
            .current
            .take()
            .ok_or_else(|| Error::Backend("end_pass without begin_pass".to_string()))?;
        self.passes.push(pass);
        self.commands.push(Command::EndPass);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::Backend("present inside a render pass".to_string()));
        }
        self.commands.push(Command::Present);
        Ok(())
    }
}
