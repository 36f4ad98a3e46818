#[cfg(feature = "integration-tests")]
use crate::common::test_utils::{
    HEIGHT, WIDTH, add_light, add_sprite, assets_dir, global_light, temp_dir, test_config,
};

#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
fn headless_gpu(width: u32, height: u32) -> vibrant::gpu::wgpu_backend::WgpuGpu {
    use vibrant::{context::Context, gpu::wgpu_backend::WgpuGpu};

    let ctx = futures::executor::block_on(Context::headless(width, height)).unwrap();
    WgpuGpu::new(ctx)
}

#[cfg(feature = "integration-tests")]
fn render_headless(
    width: u32,
    height: u32,
    build: impl FnOnce(&mut vibrant::data_structures::scene::Scene, &vibrant::resources::texture::DefaultTextures),
) -> image::RgbaImage {
    use vibrant::{
        data_structures::scene::Scene,
        render::DeferredPipeline,
        resources::{ResourceRegistry, texture::DefaultTextures},
    };

    let mut gpu = headless_gpu(width, height);
    let mut registry = ResourceRegistry::new();
    let pipeline = DeferredPipeline::new(&mut gpu, &mut registry, &test_config()).unwrap();
    let defaults = DefaultTextures::create(&mut gpu, &mut registry).unwrap();
    let mut scene = Scene::new();
    build(&mut scene, &defaults);

    pipeline.render_frame(&mut gpu, &scene).unwrap();
    let image = gpu.read_screen().unwrap().unwrap();
    registry.release_all(&mut gpu);
    image
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_light_white_sprite_with_global_light() {
    use cgmath::Vector3;
    use vibrant::data_structures::transform::Transform;

    let image = render_headless(800, 600, |scene, defaults| {
        add_sprite(
            scene,
            defaults,
            "sprite",
            Transform {
                scale: Vector3::new(4.0, 4.0, 1.0),
                ..Transform::default()
            },
        );
        add_light(scene, "sun", global_light(100.0), Vector3::new(0.0, 0.0, 0.0));
    });

    assert_eq!(image.dimensions(), (800, 600));
    assert_eq!(*image.get_pixel(400, 300), image::Rgba([255, 255, 255, 255]));
    assert_eq!(*image.get_pixel(2, 2), image::Rgba([0, 0, 0, 255]));
    assert_eq!(*image.get_pixel(797, 597), image::Rgba([0, 0, 0, 255]));
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_black_without_lights() {
    use vibrant::data_structures::transform::Transform;

    let image = render_headless(320, 240, |scene, defaults| {
        add_sprite(scene, defaults, "sprite", Transform::default());
    });

    for pixel in image.pixels() {
        assert_eq!(*pixel, image::Rgba([0, 0, 0, 255]));
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_report_invalid_wgsl_as_compile_error() {
    use vibrant::{
        Error,
        gpu::{Gpu, ShaderStage},
    };

    let mut gpu = headless_gpu(WIDTH, HEIGHT);
    let source = "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    let = ;\n    return vec4<f32>(1.0) +;\n}\n";

    let result = gpu.compile_shader(ShaderStage::Fragment, source);

    assert!(matches!(
        result,
        Err(Error::ShaderCompile {
            stage: ShaderStage::Fragment,
            ..
        })
    ));
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_fail_pipeline_setup_on_broken_shader() {
    use vibrant::{Error, render::DeferredPipeline, resources::ResourceRegistry};

    let dir = temp_dir("wgpu-broken-assets");
    for entry in std::fs::read_dir(assets_dir()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
    }
    std::fs::write(
        dir.path().join("deferred_fragment.wgsl"),
        "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    let x: f32 = vec2<f32>(1.0, 2.0);\n    return vec4<f32>(x);\n}\n",
    )
    .unwrap();
    let mut config = test_config();
    config.shaders.asset_dir = dir.path().to_path_buf();
    let mut gpu = headless_gpu(WIDTH, HEIGHT);
    let mut registry = ResourceRegistry::new();

    let result = DeferredPipeline::new(&mut gpu, &mut registry, &config);

    assert!(matches!(result, Err(Error::ShaderCompile { .. })));
    registry.release_all(&mut gpu);
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_reject_oversized_uniform_block_on_device() {
    use vibrant::{
        Error,
        gpu::{Gpu, MAX_UNIFORM_BLOCK, RenderTarget, UniformSlot},
    };

    let mut gpu = headless_gpu(WIDTH, HEIGHT);
    gpu.begin_pass(RenderTarget::Screen, [0.0; 4]).unwrap();

    let result = gpu.set_uniforms(UniformSlot::Draw, &[0u8; MAX_UNIFORM_BLOCK as usize + 1]);

    assert!(matches!(result, Err(Error::UniformBlockTooLarge { .. })));
    gpu.end_pass().unwrap();
}
