//! [`Gpu`] implementation on top of wgpu.
//!
//! wgpu has no mutable binding state, so the immediate-mode calls of the [`Gpu`] trait are buffered
//! per pass and replayed into a single `wgpu::RenderPass` when the pass ends. Uniform blocks written
//! during a pass are appended to a staging arena, uploaded as one buffer, and addressed through
//! dynamic offsets.
//!
//! Every program shares one pipeline layout:
//!
//! - `@group(0) @binding(0)` is the `Frame` uniform block
//! - `@group(1) @binding(0)` is the `Draw` uniform block
//! - `@group(2)` holds texture unit 0 and 1 as `(texture, sampler)` pairs on bindings 0 to 3
//!
//! Render pipelines are created lazily per target format and cached on the program.

use std::collections::HashMap;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::{
    context::Context,
    error::{Error, Result},
    gpu::{
        BufferId, BufferKind, FramebufferId, FramebufferStatus, Gpu, MAX_UNIFORM_BLOCK, ProgramId,
        RenderTarget, ShaderId, ShaderStage, TEXTURE_UNITS, TextureDesc, TextureFormat, TextureId,
        UniformSlot, VertexArrayId, VertexLayout, validate_wgsl,
    },
};

/// Format every framebuffer color attachment is created with.
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TextureDesc,
}

struct BufferEntry {
    buffer: wgpu::Buffer,
    kind: BufferKind,
}

struct VertexArrayEntry {
    vertices: BufferId,
    indices: BufferId,
}

struct ProgramEntry {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layout: VertexLayout,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

#[derive(Clone, Copy)]
struct PendingDraw {
    program: ProgramId,
    vertex_array: VertexArrayId,
    textures: [Option<TextureId>; TEXTURE_UNITS as usize],
    frame_offset: u32,
    draw_offset: u32,
    index_count: u32,
}

/// Calls buffered between `begin_pass` and `end_pass`.
struct PendingPass {
    target: RenderTarget,
    clear: [f32; 4],
    arena: Vec<u8>,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    textures: [Option<TextureId>; TEXTURE_UNITS as usize],
    frame_offset: u32,
    draw_offset: u32,
    draws: Vec<PendingDraw>,
}

impl PendingPass {
    fn new(target: RenderTarget, clear: [f32; 4], alignment: usize) -> Self {
        Self {
            target,
            clear,
            // Offset 0 holds a zeroed block for slots that are never written
            arena: vec![0; alignment],
            program: None,
            vertex_array: None,
            textures: [None; TEXTURE_UNITS as usize],
            frame_offset: 0,
            draw_offset: 0,
            draws: Vec::new(),
        }
    }

    fn push_block(&mut self, data: &[u8], alignment: usize) -> u32 {
        let offset = self.arena.len().next_multiple_of(alignment);
        self.arena.resize(offset, 0);
        self.arena.extend_from_slice(data);
        offset as u32
    }
}

pub struct WgpuGpu {
    ctx: Context,
    next_id: u32,
    uniform_alignment: usize,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    placeholder: TextureEntry,
    textures: HashMap<TextureId, TextureEntry>,
    buffers: HashMap<BufferId, BufferEntry>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayEntry>,
    framebuffers: HashMap<FramebufferId, Option<TextureId>>,
    shaders: HashMap<ShaderId, (ShaderStage, wgpu::ShaderModule)>,
    programs: HashMap<ProgramId, ProgramEntry>,
    texture_groups: HashMap<[Option<TextureId>; TEXTURE_UNITS as usize], wgpu::BindGroup>,
    pass: Option<PendingPass>,
    frame: Option<wgpu::SurfaceTexture>,
    offscreen: Option<TextureEntry>,
}

impl WgpuGpu {
    pub fn new(ctx: Context) -> Self {
        let device = &ctx.device;
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("uniform_block_layout"),
        });
        let texture_layout = texture_units_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Layout"),
            bind_group_layouts: &[&uniform_layout, &uniform_layout, &texture_layout],
            immediate_size: 0,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let placeholder_desc = TextureDesc {
            label: "unbound texture unit".to_string(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
        };
        let placeholder = make_texture(&ctx, &placeholder_desc, Some(&[255, 255, 255, 255]));

        let mut gpu = Self {
            next_id: 1,
            uniform_alignment,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            sampler,
            placeholder,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            texture_groups: HashMap::new(),
            pass: None,
            frame: None,
            offscreen: None,
            ctx,
        };
        gpu.recreate_offscreen();
        gpu
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Reads back the headless screen target. Returns `None` when presenting to a window.
    pub fn read_screen(&self) -> Result<Option<image::RgbaImage>> {
        let Some(offscreen) = &self.offscreen else {
            return Ok(None);
        };
        let (width, height) = (offscreen.desc.width, offscreen.desc.height);
        let unpadded = width * 4;
        let padded = unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let output = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("screen readback"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &offscreen.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = output.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.ctx
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| Error::Backend(format!("device poll failed: {e}")))?;
        futures::executor::block_on(rx.receive())
            .ok_or_else(|| Error::Backend("readback channel closed".to_string()))?
            .map_err(|e| Error::Backend(format!("failed to map readback buffer: {e}")))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(data);
        output.unmap();
        Ok(image::RgbaImage::from_raw(width, height, pixels))
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn recreate_offscreen(&mut self) {
        if !self.ctx.is_headless() {
            return;
        }
        let desc = TextureDesc {
            label: "offscreen screen".to_string(),
            width: self.ctx.config.width,
            height: self.ctx.config.height,
            format: TextureFormat::Rgba8,
        };
        self.offscreen = Some(make_texture(&self.ctx, &desc, None));
    }

    fn screen_format(&self) -> wgpu::TextureFormat {
        self.ctx.config.format
    }

    fn build_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        layout: &VertexLayout,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let attributes: Vec<wgpu::VertexAttribute> = layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                offset: a.offset,
                shader_location: a.location,
                format: match a.components {
                    1 => wgpu::VertexFormat::Float32,
                    2 => wgpu::VertexFormat::Float32x2,
                    3 => wgpu::VertexFormat::Float32x3,
                    _ => wgpu::VertexFormat::Float32x4,
                },
            })
            .collect();
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];
        self.ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("Program Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some(ShaderStage::Vertex.entry_point()),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some(ShaderStage::Fragment.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // Sprites can be mirrored through a negative scale
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
            })
    }

    fn ensure_pipeline(&mut self, program: ProgramId, format: wgpu::TextureFormat) -> Result<()> {
        let entry = self.programs.get(&program).ok_or(Error::InvalidHandle {
            kind: ProgramId::KIND,
            id: program.0,
        })?;
        if entry.pipelines.contains_key(&format) {
            return Ok(());
        }
        let pipeline = self.build_pipeline(&entry.vertex, &entry.fragment, &entry.layout, format);
        log::debug!("created pipeline for {program} targeting {format:?}");
        if let Some(entry) = self.programs.get_mut(&program) {
            entry.pipelines.insert(format, pipeline);
        }
        Ok(())
    }

    fn ensure_texture_group(&mut self, units: [Option<TextureId>; TEXTURE_UNITS as usize]) -> Result<()> {
        if self.texture_groups.contains_key(&units) {
            return Ok(());
        }
        let mut views = Vec::with_capacity(units.len());
        for unit in units {
            let view = match unit {
                Some(id) => {
                    &self
                        .textures
                        .get(&id)
                        .ok_or(Error::InvalidHandle {
                            kind: TextureId::KIND,
                            id: id.0,
                        })?
                        .view
                }
                None => &self.placeholder.view,
            };
            views.push(view);
        }
        let group = self
            .ctx
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(views[0]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(views[1]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
                label: Some("texture_units_bind_group"),
            });
        self.texture_groups.insert(units, group);
        Ok(())
    }

    /// Resolves the view a pass draws into. `None` means the frame has to be skipped.
    fn acquire_screen(&mut self) -> Result<Option<wgpu::TextureView>> {
        if let Some(offscreen) = &self.offscreen {
            return Ok(Some(offscreen.view.clone()));
        }
        if self.frame.is_none() {
            let Some(surface) = &self.ctx.surface else {
                return Err(Error::Backend("no presentation surface".to_string()));
            };
            match surface.get_current_texture() {
                Ok(frame) => self.frame = Some(frame),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("surface lost or outdated, reconfiguring");
                    self.ctx.reconfigure();
                    return Ok(None);
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    log::warn!("surface timeout, skipping frame");
                    return Ok(None);
                }
                Err(e) => return Err(Error::Backend(format!("surface error: {e}"))),
            }
        }
        Ok(self.frame.as_ref().map(|frame| {
            frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())
        }))
    }

    fn check_texture_limit(&self, desc: &TextureDesc) -> Result<()> {
        let limit = self.ctx.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(Error::Backend(format!(
                "texture `{}` of {}x{} exceeds the {limit} limit",
                desc.label, desc.width, desc.height
            )));
        }
        Ok(())
    }

    fn missing_buffer(id: BufferId) -> Error {
        Error::InvalidHandle {
            kind: BufferId::KIND,
            id: id.0,
        }
    }
}

/// Texture units 0 and 1, each a filterable 2D texture followed by its sampler.
fn texture_units_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    let sampler = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[texture(0), sampler(1), texture(2), sampler(3)],
        label: Some("texture_units_layout"),
    })
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TextureFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
        TextureFormat::Rgb8 | TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn make_texture(ctx: &Context, desc: &TextureDesc, pixels: Option<&[u8]>) -> TextureEntry {
    let size = extent(desc.width, desc.height);
    let format = wgpu_format(desc.format);
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&desc.label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });

    if let Some(pixels) = pixels {
        // Three-channel data is widened to the four-channel storage format
        let (data, bytes_per_pixel) = match desc.format {
            TextureFormat::Rgb8 => (
                pixels
                    .chunks_exact(3)
                    .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect::<Vec<u8>>(),
                4,
            ),
            other => (pixels.to_vec(), other.channels()),
        };
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_pixel * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    TextureEntry {
        texture,
        view,
        desc: desc.clone(),
    }
}

impl Gpu for WgpuGpu {
    fn surface_size(&self) -> PhysicalSize<u32> {
        self.ctx.size()
    }

    fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        // An acquired frame belongs to the old configuration
        self.frame = None;
        self.ctx.resize(size);
        self.recreate_offscreen();
    }

    fn request_redraw(&self) {
        if let Some(window) = self.ctx.window() {
            window.request_redraw();
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> Result<TextureId> {
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
        self.check_texture_limit(desc)?;
        let entry = make_texture(&self.ctx, desc, pixels);
        let id = TextureId(self.next());
        log::debug!(
            "created {id} `{}` {}x{} {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.textures.insert(id, entry);
        Ok(id)
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) -> Result<()> {
        let entry = self.textures.get(&texture).ok_or(Error::InvalidHandle {
            kind: TextureId::KIND,
            id: texture.0,
        })?;
        let desc = TextureDesc {
            width: width.max(1),
            height: height.max(1),
            ..entry.desc.clone()
        };
        self.check_texture_limit(&desc)?;
        let resized = make_texture(&self.ctx, &desc, None);
        self.textures.insert(texture, resized);
        self.texture_groups.clear();
        Ok(())
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .map(|t| (t.desc.width, t.desc.height))
    }

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferId> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;
        let buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match kind {
                    BufferKind::Vertex => "Vertex Buffer",
                    BufferKind::Index => "Index Buffer",
                    BufferKind::Uniform => "Uniform Buffer",
                }),
                contents,
                usage,
            });
        let id = BufferId(self.next());
        self.buffers.insert(id, BufferEntry { buffer, kind });
        Ok(id)
    }

    fn create_vertex_array(
        &mut self,
        _layout: &VertexLayout,
        vertices: BufferId,
        indices: BufferId,
    ) -> Result<VertexArrayId> {
        for (buffer, kind) in [(vertices, BufferKind::Vertex), (indices, BufferKind::Index)] {
            let entry = self
                .buffers
                .get(&buffer)
                .ok_or_else(|| Self::missing_buffer(buffer))?;
            if entry.kind != kind {
                return Err(Error::Backend(format!(
                    "{buffer} is a {:?} buffer, expected {kind:?}",
                    entry.kind
                )));
            }
        }
        let id = VertexArrayId(self.next());
        self.vertex_arrays
            .insert(id, VertexArrayEntry { vertices, indices });
        Ok(id)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.next());
        self.framebuffers.insert(id, None);
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
        Ok(())
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(attachment) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::Incomplete(format!("unknown {framebuffer}"));
        };
        let Some(entry) = attachment.as_ref().and_then(|t| self.textures.get(t)) else {
            return FramebufferStatus::Incomplete("missing color attachment".to_string());
        };
        let limit = self.ctx.device.limits().max_texture_dimension_2d;
        if entry.desc.width > limit || entry.desc.height > limit {
            return FramebufferStatus::Incomplete(format!(
                "color attachment {}x{} exceeds the {limit} limit",
                entry.desc.width, entry.desc.height
            ));
        }
        if wgpu_format(entry.desc.format) != TARGET_FORMAT {
            return FramebufferStatus::Incomplete(format!(
                "color attachment format {:?} is not renderable as {TARGET_FORMAT:?}",
                entry.desc.format
            ));
        }
        FramebufferStatus::Complete
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId> {
        validate_wgsl(stage, source)?;
        let module = self
            .ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "Vertex Shader",
                    ShaderStage::Fragment => "Fragment Shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let id = ShaderId(self.next());
        self.shaders.insert(id, (stage, module));
        Ok(id)
    }

    fn link_program(&mut self, shaders: &[ShaderId], layout: &VertexLayout) -> Result<ProgramId> {
        let mut vertex = None;
        let mut fragment = None;
        for shader in shaders {
            let (stage, module) = self
                .shaders
                .get(shader)
                .ok_or_else(|| Error::ShaderLink(format!("{shader} is not a compiled shader")))?;
            match stage {
                ShaderStage::Vertex => vertex = Some(module.clone()),
                ShaderStage::Fragment => fragment = Some(module.clone()),
            }
        }
        let vertex = vertex.ok_or_else(|| Error::ShaderLink("no vertex stage attached".into()))?;
        let fragment =
            fragment.ok_or_else(|| Error::ShaderLink("no fragment stage attached".into()))?;

        let pipeline = self.build_pipeline(&vertex, &fragment, layout, TARGET_FORMAT);

        let id = ProgramId(self.next());
        let mut pipelines = HashMap::new();
        pipelines.insert(TARGET_FORMAT, pipeline);
        self.programs.insert(
            id,
            ProgramEntry {
                vertex,
                fragment,
                layout: layout.clone(),
                pipelines,
            },
        );
        log::debug!("linked {id}");
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn delete_textures(&mut self, textures: &[TextureId]) {
        for texture in textures {
            if let Some(entry) = self.textures.remove(texture) {
                entry.texture.destroy();
            }
        }
        self.texture_groups.clear();
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) {
        for buffer in buffers {
            if let Some(entry) = self.buffers.remove(buffer) {
                entry.buffer.destroy();
            }
        }
    }

    fn delete_vertex_arrays(&mut self, vertex_arrays: &[VertexArrayId]) {
        for vertex_array in vertex_arrays {
            self.vertex_arrays.remove(vertex_array);
        }
    }

    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]) {
        for framebuffer in framebuffers {
            self.framebuffers.remove(framebuffer);
        }
    }

    fn begin_pass(&mut self, target: RenderTarget, clear: [f32; 4]) -> Result<()> {
        if self.pass.is_some() {
            return Err(Error::Backend("render pass already in progress".to_string()));
        }
        if let RenderTarget::Framebuffer(framebuffer) = target {
            if let FramebufferStatus::Incomplete(reason) = self.framebuffer_status(framebuffer) {
                return Err(Error::FramebufferIncomplete(reason));
            }
        }
        self.pass = Some(PendingPass::new(target, clear, self.uniform_alignment));
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) {
        if let Some(pass) = self.pass.as_mut() {
            pass.program = Some(program);
        }
    }

    fn set_uniforms(&mut self, slot: UniformSlot, data: &[u8]) -> Result<()> {
        if data.len() as u64 > MAX_UNIFORM_BLOCK {
            return Err(Error::UniformBlockTooLarge {
                len: data.len(),
                max: MAX_UNIFORM_BLOCK,
            });
        }
        let alignment = self.uniform_alignment;
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| Error::Backend("uniform upload outside of a render pass".to_string()))?;
        let offset = pass.push_block(data, alignment);
        match slot {
            UniformSlot::Frame => pass.frame_offset = offset,
            UniformSlot::Draw => pass.draw_offset = offset,
        }
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        match pass.textures.get_mut(unit as usize) {
            Some(slot) => *slot = Some(texture),
            None => log::warn!("texture unit {unit} out of range, binding ignored"),
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if let Some(pass) = self.pass.as_mut() {
            pass.vertex_array = Some(vertex_array);
        }
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<()> {
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| Error::Backend("draw outside of a render pass".to_string()))?;
        let program = pass
            .program
            .ok_or_else(|| Error::Backend("draw without a program in use".to_string()))?;
        let vertex_array = pass
            .vertex_array
            .ok_or_else(|| Error::Backend("draw without a vertex array bound".to_string()))?;
        pass.draws.push(PendingDraw {
            program,
            vertex_array,
            textures: pass.textures,
            frame_offset: pass.frame_offset,
            draw_offset: pass.draw_offset,
            index_count,
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        let mut pass = self
            .pass
            .take()
            .ok_or_else(|| Error::Backend("end_pass without begin_pass".to_string()))?;

        let (view, format) = match pass.target {
            RenderTarget::Framebuffer(framebuffer) => {
                let texture = self
                    .framebuffers
                    .get(&framebuffer)
                    .copied()
                    .flatten()
                    .ok_or(Error::InvalidHandle {
                        kind: FramebufferId::KIND,
                        id: framebuffer.0,
                    })?;
                let entry = self.textures.get(&texture).ok_or(Error::InvalidHandle {
                    kind: TextureId::KIND,
                    id: texture.0,
                })?;
                (entry.view.clone(), TARGET_FORMAT)
            }
            RenderTarget::Screen => match self.acquire_screen()? {
                Some(view) => (view, self.screen_format()),
                None => return Ok(()),
            },
        };

        for draw in pass.draws.clone() {
            self.ensure_pipeline(draw.program, format)?;
            self.ensure_texture_group(draw.textures)?;
        }

        // Every dynamic offset must leave room for a full block
        let last = pass.draws.iter().fold(0, |acc, d| {
            acc.max(d.frame_offset).max(d.draw_offset)
        }) as usize;
        pass.arena
            .resize((last + MAX_UNIFORM_BLOCK as usize).max(pass.arena.len()), 0);

        let device = &self.ctx.device;
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Pass Uniforms"),
            contents: &pass.arena,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniforms,
                    offset: 0,
                    size: wgpu::BufferSize::new(MAX_UNIFORM_BLOCK),
                }),
            }],
            label: Some("pass_uniform_bind_group"),
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pass Encoder"),
        });
        {
            let [r, g, b, a] = pass.clear.map(f64::from);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            for draw in &pass.draws {
                let (Some(program), Some(vertex_array), Some(textures)) = (
                    self.programs.get(&draw.program),
                    self.vertex_arrays.get(&draw.vertex_array),
                    self.texture_groups.get(&draw.textures),
                ) else {
                    return Err(Error::InvalidHandle {
                        kind: VertexArrayId::KIND,
                        id: draw.vertex_array.0,
                    });
                };
                let (Some(pipeline), Some(vertices), Some(indices)) = (
                    program.pipelines.get(&format),
                    self.buffers.get(&vertex_array.vertices),
                    self.buffers.get(&vertex_array.indices),
                ) else {
                    return Err(Self::missing_buffer(vertex_array.vertices));
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &uniform_group, &[draw.frame_offset]);
                render_pass.set_bind_group(1, &uniform_group, &[draw.draw_offset]);
                render_pass.set_bind_group(2, textures, &[]);
                render_pass.set_vertex_buffer(0, vertices.buffer.slice(..));
                render_pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.pass.is_some() {
            return Err(Error::Backend("present inside a render pass".to_string()));
        }
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        Ok(())
    }
}
