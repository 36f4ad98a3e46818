//! The four-pass deferred frame.
//!
//! 1. **Color**: every `sprite` object is drawn into the color buffer with its color texture.
//! 2. **Normal**: the same draws go into the normal buffer with the normal textures.
//! 3. **Lighting**: a full-screen quad combines both buffers with all `light` objects.
//! 4. **Composite**: the lit buffer is copied onto the screen and presented.
//!
//! The composite pass can show the color or normal buffer instead of the lit one, see
//! [`BufferView`].
//!
//! The three offscreen buffers are rendered at a fraction of the window resolution and sampled
//! with nearest filtering, which gives the output its pixelated look.

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::{
    config::Config,
    data_structures::{
        attribute::{keys, tags},
        light::{Light, LightRaw, LightsUniform},
        scene::Scene,
        transform::Transform,
    },
    error::{Error, Result},
    gpu::{FramebufferId, Gpu, ProgramId, RenderTarget, TextureId, UniformSlot},
    pipelines::{CameraUniform, ModelUniform, Programs},
    resources::{ResourceRegistry, framebuffer::create_framebuffer, mesh::Quad},
};

/// What a frame drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub sprites: usize,
    pub lights: usize,
    pub draw_calls: usize,
}

/// Which offscreen buffer the composite pass shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BufferView {
    #[default]
    Lit,
    Color,
    Normal,
}

impl BufferView {
    pub fn next(&self) -> Self {
        match self {
            BufferView::Lit => BufferView::Color,
            BufferView::Color => BufferView::Normal,
            BufferView::Normal => BufferView::Lit,
        }
    }
}

/// A framebuffer and the texture its pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub framebuffer: FramebufferId,
    pub color: TextureId,
}

impl Target {
    fn create(
        gpu: &mut dyn Gpu,
        registry: &mut ResourceRegistry,
        scale: f32,
    ) -> Result<Self> {
        let window = gpu.surface_size();
        let framebuffer = create_framebuffer(gpu, registry, window, scale)?;
        let color = registry
            .framebuffer(framebuffer)
            .map(|f| f.color)
            .ok_or(Error::InvalidHandle {
                kind: FramebufferId::KIND,
                id: framebuffer.0,
            })?;
        Ok(Self { framebuffer, color })
    }
}

/// Per-sprite inputs of the color and normal passes.
#[derive(Debug, Clone, Copy)]
struct SpriteDraw {
    model: ModelUniform,
    color: TextureId,
    normal: TextureId,
}

#[derive(Debug)]
pub struct DeferredPipeline {
    programs: Programs,
    sprite_quad: Quad,
    screen_quad: Quad,
    color: Target,
    normal: Target,
    lighting: Target,
    view: BufferView,
    ortho_scale: f32,
    buffer_clear: [f32; 4],
    screen_clear: [f32; 4],
}

impl DeferredPipeline {
    /// Loads the programs and allocates geometry and the three offscreen buffers.
    pub fn new(gpu: &mut dyn Gpu, registry: &mut ResourceRegistry, config: &Config) -> Result<Self> {
        let programs = Programs::load(gpu, registry, &config.shaders)?;
        let sprite_quad = Quad::sprite(gpu, registry)?;
        let screen_quad = Quad::screen(gpu, registry)?;
        let scale = config.render.buffer_scale;
        let color = Target::create(gpu, registry, scale)?;
        let normal = Target::create(gpu, registry, scale)?;
        let lighting = Target::create(gpu, registry, scale)?;
        Ok(Self {
            programs,
            sprite_quad,
            screen_quad,
            color,
            normal,
            lighting,
            view: BufferView::default(),
            ortho_scale: config.render.ortho_scale,
            buffer_clear: config.render.buffer_clear_color,
            screen_clear: config.render.screen_clear_color,
        })
    }

    pub fn programs(&self) -> &Programs {
        &self.programs
    }

    pub fn color_target(&self) -> Target {
        self.color
    }

    pub fn normal_target(&self) -> Target {
        self.normal
    }

    pub fn lighting_target(&self) -> Target {
        self.lighting
    }

    pub fn view(&self) -> BufferView {
        self.view
    }

    pub fn set_view(&mut self, view: BufferView) {
        log::info!("showing {view:?} buffer");
        self.view = view;
    }

    /// Half width and half height of the visible world rectangle.
    pub fn half_extent(&self, gpu: &dyn Gpu) -> [f32; 2] {
        let size = gpu.surface_size();
        let aspect = if size.height == 0 {
            1.0
        } else {
            size.width as f32 / size.height as f32
        };
        [self.ortho_scale * aspect, self.ortho_scale]
    }

    pub fn projection(&self, gpu: &dyn Gpu) -> Matrix4<f32> {
        let [half_width, half_height] = self.half_extent(gpu);
        cgmath::ortho(-half_width, half_width, -half_height, half_height, -1.0, 1.0)
    }

    /// Renders and presents one frame of `scene`.
    ///
    /// All sprite and light attributes are resolved before the first pass begins, so a malformed
    /// object fails the frame without any draw call having been issued.
    pub fn render_frame(&self, gpu: &mut dyn Gpu, scene: &Scene) -> Result<FrameStats> {
        let sprites = collect_sprites(scene)?;
        let lights = collect_lights(scene)?;
        let camera = CameraUniform::new(self.projection(gpu), Matrix4::identity());
        let lights = LightsUniform::new(&lights, self.half_extent(gpu));

        self.sprite_pass(gpu, self.color, &camera, sprites.iter().map(|s| (s.model, s.color)))?;
        self.sprite_pass(gpu, self.normal, &camera, sprites.iter().map(|s| (s.model, s.normal)))?;

        gpu.begin_pass(RenderTarget::Framebuffer(self.lighting.framebuffer), self.buffer_clear)?;
        gpu.use_program(self.programs.deferred);
        gpu.bind_vertex_array(self.screen_quad.vertex_array);
        gpu.set_uniforms(UniformSlot::Frame, bytemuck::bytes_of(&lights))?;
        gpu.bind_texture(0, self.color.color);
        gpu.bind_texture(1, self.normal.color);
        gpu.draw_indexed(self.screen_quad.index_count)?;
        gpu.end_pass()?;

        let shown = match self.view {
            BufferView::Lit => self.lighting,
            BufferView::Color => self.color,
            BufferView::Normal => self.normal,
        };
        self.composite(gpu, self.programs.combine, shown.color)?;
        gpu.present()?;

        let stats = FrameStats {
            sprites: sprites.len(),
            lights: lights.count as usize,
            draw_calls: 2 * sprites.len() + 2,
        };
        log::trace!("{stats:?}");
        Ok(stats)
    }

    fn sprite_pass(
        &self,
        gpu: &mut dyn Gpu,
        target: Target,
        camera: &CameraUniform,
        draws: impl Iterator<Item = (ModelUniform, TextureId)>,
    ) -> Result<()> {
        gpu.begin_pass(RenderTarget::Framebuffer(target.framebuffer), self.buffer_clear)?;
        gpu.use_program(self.programs.sprite);
        gpu.bind_vertex_array(self.sprite_quad.vertex_array);
        gpu.set_uniforms(UniformSlot::Frame, bytemuck::bytes_of(camera))?;
        for (model, texture) in draws {
            gpu.set_uniforms(UniformSlot::Draw, bytemuck::bytes_of(&model))?;
            gpu.bind_texture(0, texture);
            gpu.draw_indexed(self.sprite_quad.index_count)?;
        }
        gpu.end_pass()
    }

    fn composite(&self, gpu: &mut dyn Gpu, program: ProgramId, source: TextureId) -> Result<()> {
        gpu.begin_pass(RenderTarget::Screen, self.screen_clear)?;
        gpu.use_program(program);
        gpu.bind_vertex_array(self.screen_quad.vertex_array);
        gpu.bind_texture(0, source);
        gpu.draw_indexed(self.screen_quad.index_count)?;
        gpu.end_pass()
    }
}

fn collect_sprites(scene: &Scene) -> Result<Vec<SpriteDraw>> {
    scene
        .tagged(tags::SPRITE)
        .map(|object| {
            Ok(SpriteDraw {
                model: Transform::from_object(object)?.to_matrix().into(),
                color: *object.attribute::<TextureId>(keys::COLOR_TEXTURE)?,
                normal: *object.attribute::<TextureId>(keys::NORMAL_TEXTURE)?,
            })
        })
        .collect()
}

/// Light records in scene order.
pub fn collect_lights(scene: &Scene) -> Result<Vec<LightRaw>> {
    scene
        .tagged(tags::LIGHT)
        .map(|object| {
            let position = *object.attribute::<Vector3<f32>>(keys::POSITION)?;
            Ok(Light::from_object(object)?.to_raw(position))
        })
        .collect()
}
