//! Application event loop.
//!
//! [`run`] opens the window, builds the renderer once the event loop is resumed and then drives
//! it from winit events:
//!
//! - `Resized` resizes the surface and every offscreen buffer
//! - `RedrawRequested` renders a frame and asks for the next one
//! - keyboard input and dropped files are forwarded to the [`Editor`]
//! - `CloseRequested` releases all GPU resources and leaves the loop
//!
//! A setup or render failure is fatal: the loop exits and [`run`] returns the error. Once the
//! window state is torn down no later event reaches it.
//!
//! # Key bindings
//!
//! | Key | Action |
//! |---|---|
//! | S / L / N | new sprite / light / empty object |
//! | Tab | select next object |
//! | Delete | remove selected object |
//! | Arrows | move selected object |
//! | Q / E | rotate selected object |
//! | + / - | scale selected object |
//! | T | toggle light type |
//! | [ / ] | light intensity down / up |
//! | , / . | light falloff down / up |
//! | Z / X | volumetric intensity down / up |
//! | 1 to 6 | light color preset |
//! | F | focus next scalar attribute |
//! | PageUp / PageDown | step focused attribute |
//! | B | cycle shown buffer (lit, color, normal) |
//! | I | log an inspector report |
//!
//! Dropping an image onto the window sets it as the color texture of the selected object, or as
//! its normal texture while Shift is held.

use std::{path::Path, sync::Arc};

use anyhow::Context as _;
use cgmath::Vector3;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::Window,
};

use crate::{
    config::{Config, LoggingConfig},
    context::Context,
    data_structures::{attribute::keys, scene::Scene},
    editor::{Editor, inspector::InspectorReport},
    gpu::{Gpu, wgpu_backend::WgpuGpu},
    render::{DeferredPipeline, FrameStats},
    resources::{ResourceRegistry, framebuffer::on_window_resize, texture::DefaultTextures},
};

/// World units an arrow key press moves the selection.
const NUDGE_STEP: f32 = 0.5;
const ROTATE_STEP: f32 = 15.0;
const SCALE_STEP: f32 = 1.25;
const INTENSITY_STEP: f32 = 1.25;
const FALLOFF_STEP: f32 = 1.25;
const VOLUMETRIC_STEP: f32 = 0.05;

/// Light colors behind the number keys.
const LIGHT_COLORS: [[f32; 3]; 6] = [
    [1.0, 1.0, 1.0],
    [1.0, 0.8, 0.6],
    [1.0, 0.3, 0.2],
    [0.3, 1.0, 0.4],
    [0.3, 0.5, 1.0],
    [0.8, 0.4, 1.0],
];

/// What the event loop should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Everything that lives as long as the window.
pub struct AppState<G: Gpu = WgpuGpu> {
    gpu: G,
    registry: ResourceRegistry,
    pipeline: DeferredPipeline,
    scene: Scene,
    editor: Editor,
    shift: bool,
    minimized: bool,
    last_report: Instant,
    frames: u32,
}

impl AppState<WgpuGpu> {
    pub async fn new(window: Arc<Window>, config: &Config) -> anyhow::Result<Self> {
        let ctx = Context::new(window)
            .await
            .context("failed to initialise the graphics device")?;
        let mut gpu = WgpuGpu::new(ctx);
        let mut registry = ResourceRegistry::new();
        let pipeline = DeferredPipeline::new(&mut gpu, &mut registry, config)
            .context("failed to build the render pipeline")?;
        let defaults = DefaultTextures::create(&mut gpu, &mut registry)
            .context("failed to create default textures")?;
        Self::from_parts(gpu, registry, pipeline, defaults)
    }
}

impl<G: Gpu> AppState<G> {
    /// Wraps an initialised driver and pipeline and populates the starter scene: one sprite and
    /// one point light above and to the right of it.
    pub fn from_parts(
        gpu: G,
        registry: ResourceRegistry,
        pipeline: DeferredPipeline,
        defaults: DefaultTextures,
    ) -> anyhow::Result<Self> {
        let mut scene = Scene::new();
        let mut editor = Editor::new(defaults);
        editor.new_sprite(&mut scene);
        let light = editor.new_light(&mut scene);
        if let Some(light) = scene.get_mut(light) {
            *light.attribute_mut::<Vector3<f32>>(keys::POSITION)? = Vector3::new(2.0, 2.0, 0.0);
        }
        log::info!("ready with {} objects", scene.len());

        Ok(Self {
            gpu,
            registry,
            pipeline,
            scene,
            editor,
            shift: false,
            minimized: false,
            last_report: Instant::now(),
            frames: 0,
        })
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &DeferredPipeline {
        &self.pipeline
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Handles one window event. Returns [`Control::Exit`] when the window was closed.
    pub fn handle_window_event(&mut self, event: WindowEvent) -> anyhow::Result<Control> {
        match event {
            WindowEvent::CloseRequested => return Ok(Control::Exit),
            WindowEvent::Resized(size) => self.resize(size)?,
            WindowEvent::RedrawRequested => {
                self.render()?;
                self.gpu.request_redraw();
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.shift = modifiers.state().shift_key();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.handle_key(&logical_key)?,
            WindowEvent::DroppedFile(path) => self.drop_file(&path),
            _ => {}
        }
        Ok(Control::Continue)
    }

    /// Follows the window size. A minimized window shrinks the buffers to one pixel and pauses
    /// rendering; the surface keeps its last size because it cannot be configured empty.
    fn resize(&mut self, size: PhysicalSize<u32>) -> anyhow::Result<()> {
        self.minimized = size.width == 0 || size.height == 0;
        if !self.minimized {
            self.gpu.resize_surface(size);
        }
        on_window_resize(&mut self.gpu, &mut self.registry, size)
            .context("failed to resize framebuffers")?;
        Ok(())
    }

    fn render(&mut self) -> anyhow::Result<Option<FrameStats>> {
        if self.minimized {
            return Ok(None);
        }
        let stats = self
            .pipeline
            .render_frame(&mut self.gpu, &self.scene)
            .context("failed to render frame")?;
        self.frames += 1;
        let elapsed = self.last_report.elapsed();
        if elapsed >= Duration::from_secs(1) {
            log::debug!(
                "{:.1} fps, {} sprites, {} lights, {} draw calls",
                self.frames as f32 / elapsed.as_secs_f32(),
                stats.sprites,
                stats.lights,
                stats.draw_calls
            );
            self.frames = 0;
            self.last_report = Instant::now();
        }
        Ok(Some(stats))
    }

    fn handle_key(&mut self, key: &Key) -> anyhow::Result<()> {
        let scene = &mut self.scene;
        let editor = &mut self.editor;
        match key {
            Key::Named(NamedKey::Tab) => {
                editor.select_next(scene);
            }
            Key::Named(NamedKey::Delete) => {
                editor.remove_selected(scene);
            }
            Key::Named(NamedKey::ArrowLeft) => {
                editor.nudge(scene, -NUDGE_STEP, 0.0)?;
            }
            Key::Named(NamedKey::ArrowRight) => {
                editor.nudge(scene, NUDGE_STEP, 0.0)?;
            }
            Key::Named(NamedKey::ArrowUp) => {
                editor.nudge(scene, 0.0, NUDGE_STEP)?;
            }
            Key::Named(NamedKey::ArrowDown) => {
                editor.nudge(scene, 0.0, -NUDGE_STEP)?;
            }
            Key::Named(NamedKey::PageUp) => {
                editor.step_focused(scene, 1);
            }
            Key::Named(NamedKey::PageDown) => {
                editor.step_focused(scene, -1);
            }
            Key::Character(c) => match c.to_lowercase().as_str() {
                "s" => {
                    editor.new_sprite(scene);
                }
                "l" => {
                    editor.new_light(scene);
                }
                "n" => {
                    editor.new_object(scene);
                }
                "q" => {
                    editor.rotate(scene, ROTATE_STEP)?;
                }
                "e" => {
                    editor.rotate(scene, -ROTATE_STEP)?;
                }
                "+" | "=" => {
                    editor.scale_by(scene, SCALE_STEP)?;
                }
                "-" => {
                    editor.scale_by(scene, 1.0 / SCALE_STEP)?;
                }
                "t" => {
                    editor.cycle_light_type(scene)?;
                }
                "[" => {
                    editor.scale_light_intensity(scene, 1.0 / INTENSITY_STEP)?;
                }
                "]" => {
                    editor.scale_light_intensity(scene, INTENSITY_STEP)?;
                }
                "," => {
                    editor.scale_light_falloff(scene, 1.0 / FALLOFF_STEP)?;
                }
                "." => {
                    editor.scale_light_falloff(scene, FALLOFF_STEP)?;
                }
                "z" => {
                    editor.adjust_volumetric_intensity(scene, -VOLUMETRIC_STEP)?;
                }
                "x" => {
                    editor.adjust_volumetric_intensity(scene, VOLUMETRIC_STEP)?;
                }
                "f" => match editor.focus_next_attribute(scene) {
                    Some(key) => log::info!("editing {key}"),
                    None => log::info!("selection has no scalar attributes"),
                },
                "b" => {
                    let view = self.pipeline.view().next();
                    self.pipeline.set_view(view);
                }
                "i" => log::info!("scene:\n{}", InspectorReport::of_scene(scene)),
                digit => {
                    let preset = digit
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| LIGHT_COLORS.get(i));
                    if let Some(color) = preset {
                        editor.set_light_color(scene, (*color).into())?;
                    }
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn drop_file(&mut self, path: &Path) {
        let Some(selected) = self.editor.selected() else {
            log::warn!("select an object before dropping {}", path.display());
            return;
        };
        let key = if self.shift {
            keys::NORMAL_TEXTURE
        } else {
            keys::COLOR_TEXTURE
        };
        self.editor.load_texture_attribute(
            &mut self.gpu,
            &mut self.registry,
            &mut self.scene,
            selected,
            key,
            path,
        );
    }

    /// Releases every GPU resource. Consumes the state so nothing can render afterwards.
    fn teardown(mut self) {
        self.registry.release_all(&mut self.gpu);
    }
}

pub struct App<G: Gpu = WgpuGpu> {
    config: Config,
    state: Option<AppState<G>>,
    error: Option<anyhow::Error>,
}

impl<G: Gpu> App<G> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
            error: None,
        }
    }

    /// An app whose window state already exists.
    pub fn with_state(config: Config, state: AppState<G>) -> Self {
        Self {
            config,
            state: Some(state),
            error: None,
        }
    }

    pub fn state(&self) -> Option<&AppState<G>> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut AppState<G>> {
        self.state.as_mut()
    }

    /// The error that ended the app, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    /// Routes a window event to the window state.
    ///
    /// Closing or a failure tears the state down; every event after that is answered with
    /// [`Control::Exit`] without being handled.
    pub fn dispatch(&mut self, event: WindowEvent) -> Control {
        let Some(state) = self.state.as_mut() else {
            return Control::Exit;
        };
        match state.handle_window_event(event) {
            Ok(Control::Continue) => Control::Continue,
            Ok(Control::Exit) => {
                log::info!("window closed");
                self.shutdown();
                Control::Exit
            }
            Err(e) => {
                self.fail(e);
                Control::Exit
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(state) = self.state.take() {
            state.teardown();
        }
    }

    fn fail(&mut self, error: anyhow::Error) {
        log::error!("{error:#}");
        self.shutdown();
        self.error = Some(error);
    }
}

impl ApplicationHandler for App<WgpuGpu> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(anyhow::Error::new(e).context("failed to open window"));
                return event_loop.exit();
            }
        };

        match futures::executor::block_on(AppState::new(window.clone(), &self.config)) {
            Ok(state) => {
                self.state = Some(state);
                window.request_redraw();
            }
            Err(e) => {
                self.fail(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if self.dispatch(event) == Control::Exit {
            event_loop.exit();
        }
    }
}

/// Initialises `env_logger`. `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(config: &LoggingConfig) {
    let env = env_logger::Env::default().default_filter_or(config.filter.as_str());
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }
}

pub fn run(config: Config) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app: App = App::new(config);
    event_loop.run_app(&mut app)?;
    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
