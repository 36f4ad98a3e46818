use std::path::PathBuf;

use cgmath::Vector3;
use vibrant::{
    config::Config,
    data_structures::{
        attribute::{keys, tags},
        light::{Light, LightKind},
        object::ObjectId,
        scene::Scene,
        transform::Transform,
    },
    render::DeferredPipeline,
    resources::{ResourceRegistry, texture::DefaultTextures},
};
use tempfile::TempDir;

use super::recording::RecordingGpu;

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;

pub fn assets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

/// Default settings with shaders read straight from the source tree.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.shaders.asset_dir = assets_dir();
    config
}

/// A fresh, empty directory below the system temp dir, removed when the guard is dropped.
pub fn temp_dir(name: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("vibrant-{name}-"))
        .tempdir()
        .unwrap()
}

/// A recording driver with a ready pipeline, default textures and an empty scene.
///
/// The command log is cleared after setup so tests only see what they trigger themselves.
pub struct Fixture {
    pub gpu: RecordingGpu,
    pub registry: ResourceRegistry,
    pub pipeline: DeferredPipeline,
    pub defaults: DefaultTextures,
    pub scene: Scene,
}

impl Fixture {
    pub fn new() -> Self {
        let mut gpu = RecordingGpu::new(WIDTH, HEIGHT);
        let mut registry = ResourceRegistry::new();
        let pipeline = DeferredPipeline::new(&mut gpu, &mut registry, &test_config()).unwrap();
        let defaults = DefaultTextures::create(&mut gpu, &mut registry).unwrap();
        gpu.clear_log();
        Self {
            gpu,
            registry,
            pipeline,
            defaults,
            scene: Scene::new(),
        }
    }

    pub fn add_sprite(&mut self, name: &str, transform: Transform) -> ObjectId {
        add_sprite(&mut self.scene, &self.defaults, name, transform)
    }

    pub fn add_light(&mut self, name: &str, light: Light, position: Vector3<f32>) -> ObjectId {
        add_light(&mut self.scene, name, light, position)
    }
}

pub fn add_sprite(
    scene: &mut Scene,
    defaults: &DefaultTextures,
    name: &str,
    transform: Transform,
) -> ObjectId {
    let object = scene.create(name);
    object.add_tag(tags::SPRITE);
    transform.register(object);
    object
        .set_attribute(keys::COLOR_TEXTURE, defaults.color)
        .set_attribute(keys::NORMAL_TEXTURE, defaults.normal);
    object.id()
}

pub fn add_light(scene: &mut Scene, name: &str, light: Light, position: Vector3<f32>) -> ObjectId {
    let object = scene.create(name);
    object
        .add_tag(tags::LIGHT)
        .set_attribute(keys::POSITION, position);
    light.register(object);
    object.id()
}

pub fn global_light(intensity: f32) -> Light {
    Light {
        kind: LightKind::Global,
        intensity,
        ..Light::default()
    }
}
