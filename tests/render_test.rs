use cgmath::{Matrix4, SquareMatrix, Vector3};
use vibrant::{
    Error,
    data_structures::{
        attribute::{keys, tags},
        light::{Light, LightKind, LightsUniform, MAX_LIGHTS},
        transform::Transform,
    },
    gpu::{Gpu, MAX_UNIFORM_BLOCK, RenderTarget, UniformSlot},
    pipelines::{CameraUniform, ModelUniform},
    render::{BufferView, collect_lights},
};

use crate::common::{
    recording::{Command, PassRecord},
    test_utils::{Fixture, global_light},
};

mod common;

fn targets(passes: &[PassRecord]) -> Vec<RenderTarget> {
    passes.iter().map(|p| p.target).collect()
}

fn lights_of(pass: &PassRecord) -> LightsUniform {
    bytemuck::pod_read_unaligned(&pass.draws[0].frame_uniforms)
}

#[test]
fn should_run_four_passes_in_order_every_frame() {
    let mut fixture = Fixture::new();
    fixture.add_sprite("sprite", Transform::default());
    let color = fixture.pipeline.color_target();
    let normal = fixture.pipeline.normal_target();
    let lighting = fixture.pipeline.lighting_target();
    let frame = [
        RenderTarget::Framebuffer(color.framebuffer),
        RenderTarget::Framebuffer(normal.framebuffer),
        RenderTarget::Framebuffer(lighting.framebuffer),
        RenderTarget::Screen,
    ];

    for _ in 0..3 {
        fixture
            .pipeline
            .render_frame(&mut fixture.gpu, &fixture.scene)
            .unwrap();
    }

    assert_eq!(targets(fixture.gpu.passes()), frame.repeat(3));
    assert_eq!(fixture.gpu.present_count(), 3);
    assert_eq!(fixture.gpu.commands().last(), Some(&Command::Present));
}

#[test]
fn should_sample_previous_pass_outputs() {
    let mut fixture = Fixture::new();
    fixture.add_sprite("sprite", Transform::default());

    fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    let passes = fixture.gpu.passes();
    let programs = *fixture.pipeline.programs();
    let lighting_draw = &passes[2].draws[0];
    assert_eq!(lighting_draw.program, Some(programs.deferred));
    assert_eq!(
        lighting_draw.textures,
        [
            Some(fixture.pipeline.color_target().color),
            Some(fixture.pipeline.normal_target().color),
        ]
    );
    let composite_draw = &passes[3].draws[0];
    assert_eq!(composite_draw.program, Some(programs.combine));
    assert_eq!(
        composite_draw.textures[0],
        Some(fixture.pipeline.lighting_target().color)
    );
}

#[test]
fn should_draw_single_sprite_with_its_textures() {
    let mut fixture = Fixture::new();
    fixture.add_sprite("sprite", Transform::default());

    let stats = fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    assert_eq!(stats.sprites, 1);
    assert_eq!(stats.draw_calls, 4);
    assert_eq!(fixture.gpu.draw_count(), 4);

    let camera = CameraUniform::new(
        fixture.pipeline.projection(&fixture.gpu),
        Matrix4::identity(),
    );
    let model = ModelUniform::from(Matrix4::identity());
    let passes = fixture.gpu.passes();
    for (pass, texture) in [
        (&passes[0], fixture.defaults.color),
        (&passes[1], fixture.defaults.normal),
    ] {
        assert_eq!(pass.draws.len(), 1);
        let draw = &pass.draws[0];
        assert_eq!(draw.program, Some(fixture.pipeline.programs().sprite));
        assert_eq!(draw.textures[0], Some(texture));
        assert_eq!(draw.index_count, 6);
        assert_eq!(draw.frame_uniforms, bytemuck::bytes_of(&camera));
        assert_eq!(draw.draw_uniforms, bytemuck::bytes_of(&model));
    }
}

#[test]
fn should_draw_sprites_in_scene_order() {
    let mut fixture = Fixture::new();
    let positions = [-3.0, 0.0, 4.5];
    for (i, x) in positions.iter().enumerate() {
        fixture.add_sprite(
            &format!("sprite {i}"),
            Transform {
                position: Vector3::new(*x, 0.0, 0.0),
                ..Transform::default()
            },
        );
    }

    fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    let color_pass = &fixture.gpu.passes()[0];
    assert_eq!(color_pass.draws.len(), 3);
    for (draw, x) in color_pass.draws.iter().zip(positions) {
        let model: ModelUniform = bytemuck::pod_read_unaligned(&draw.draw_uniforms);
        assert_eq!(model.model[3][0], x);
    }
}

#[test]
fn should_skip_objects_without_exact_tags() {
    let mut fixture = Fixture::new();
    let id = fixture.add_sprite("sprite", Transform::default());
    let untagged = fixture.scene.create("decoy");
    Transform::default().register(untagged);
    untagged.add_tag("Sprite");
    fixture.scene.create("empty");

    let stats = fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    assert_eq!(stats.sprites, 1);
    assert_eq!(fixture.gpu.passes()[0].draws.len(), 1);
    assert!(fixture.scene.get(id).unwrap().has_tag(tags::SPRITE));
}

#[test]
fn should_clear_buffers_and_screen_with_configured_colors() {
    let mut fixture = Fixture::new();

    fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    let passes = fixture.gpu.passes();
    for pass in &passes[..3] {
        assert_eq!(pass.clear, [0.0, 0.0, 0.0, 1.0]);
    }
    assert_eq!(passes[3].clear, [0.1, 0.1, 0.1, 1.0]);
    // Empty scene still lights and composites
    assert_eq!(passes[0].draws.len(), 0);
    assert_eq!(passes[2].draws.len(), 1);
    assert_eq!(passes[3].draws.len(), 1);
}

#[test]
fn should_aggregate_lights_in_scene_order() {
    let mut fixture = Fixture::new();
    fixture.add_light("ambient", global_light(20.0), Vector3::new(0.0, 0.0, 0.0));
    fixture.add_sprite("sprite", Transform::default());
    fixture.add_light(
        "lamp",
        Light {
            intensity: 50.0,
            color: Vector3::new(1.0, 0.5, 0.0),
            ..Light::default()
        },
        Vector3::new(2.0, -1.0, 0.0),
    );
    fixture.add_light("torch", Light::default(), Vector3::new(-4.0, 3.0, 0.0));

    let stats = fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    assert_eq!(stats.lights, 3);
    let uniform = lights_of(&fixture.gpu.passes()[2]);
    assert_eq!(uniform.count, 3);
    assert_eq!(uniform.half_extent, [10.0 * (800.0 / 600.0), 10.0]);
    let active = uniform.active();
    assert_eq!(active[0].kind, LightKind::Global.code());
    assert_eq!(active[0].intensity, 20.0);
    assert_eq!(active[1].kind, LightKind::Point.code());
    assert_eq!(active[1].position, [2.0, -1.0, 0.0]);
    assert_eq!(active[1].color, [1.0, 0.5, 0.0]);
    assert_eq!(active[2].position, [-4.0, 3.0, 0.0]);
    assert_eq!(active[2].falloff, 0.1);
    assert_eq!(active[2].volumetric_intensity, 0.1);
}

#[test]
fn should_truncate_lights_beyond_capacity() {
    let mut fixture = Fixture::new();
    for i in 0..MAX_LIGHTS + 6 {
        fixture.add_light(
            &format!("light {i}"),
            Light {
                intensity: i as f32,
                ..Light::default()
            },
            Vector3::new(0.0, 0.0, 0.0),
        );
    }

    assert_eq!(collect_lights(&fixture.scene).unwrap().len(), MAX_LIGHTS + 6);
    let stats = fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene)
        .unwrap();

    assert_eq!(stats.lights, MAX_LIGHTS);
    let uniform = lights_of(&fixture.gpu.passes()[2]);
    assert_eq!(uniform.count as usize, MAX_LIGHTS);
    assert_eq!(uniform.active().last().unwrap().intensity, (MAX_LIGHTS - 1) as f32);
}

#[test]
fn should_fail_frame_without_drawing_when_sprite_is_malformed() {
    let mut fixture = Fixture::new();
    fixture.add_sprite("good", Transform::default());
    let broken = fixture.scene.create("broken");
    broken.add_tag(tags::SPRITE);
    Transform::default().register(broken);
    broken.set_attribute(keys::COLOR_TEXTURE, fixture.defaults.color);

    let result = fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene);

    assert!(matches!(
        result,
        Err(Error::AttributeNotFound(key)) if key == keys::NORMAL_TEXTURE
    ));
    assert_eq!(fixture.gpu.draw_count(), 0);
    assert!(fixture.gpu.commands().is_empty());
}

#[test]
fn should_fail_frame_when_light_attribute_is_mistyped() {
    let mut fixture = Fixture::new();
    let lamp = fixture.scene.create("lamp");
    lamp.add_tag(tags::LIGHT)
        .set_attribute(keys::POSITION, Vector3::new(0.0f32, 0.0, 0.0))
        .set_attribute(keys::LIGHT_TYPE, 1i32)
        .set_attribute(keys::LIGHT_INTENSITY, 100i32);

    let result = fixture
        .pipeline
        .render_frame(&mut fixture.gpu, &fixture.scene);

    assert!(matches!(result, Err(Error::AttributeTypeMismatch { .. })));
    assert_eq!(fixture.gpu.draw_count(), 0);
}

#[test]
fn should_composite_the_chosen_buffer() {
    let mut fixture = Fixture::new();
    fixture.add_sprite("sprite", Transform::default());
    let shown = [
        (BufferView::Color, fixture.pipeline.color_target().color),
        (BufferView::Normal, fixture.pipeline.normal_target().color),
        (BufferView::Lit, fixture.pipeline.lighting_target().color),
    ];
    assert_eq!(fixture.pipeline.view(), BufferView::Lit);

    for (view, texture) in shown {
        let next = fixture.pipeline.view().next();
        assert_eq!(next, view);
        fixture.pipeline.set_view(next);
        fixture.gpu.clear_log();

        fixture
            .pipeline
            .render_frame(&mut fixture.gpu, &fixture.scene)
            .unwrap();

        let passes = fixture.gpu.passes();
        assert_eq!(passes.len(), 4);
        assert_eq!(passes[3].draws[0].textures[0], Some(texture));
    }
}

#[test]
fn should_reject_oversized_uniform_block() {
    let mut fixture = Fixture::new();
    let block = vec![0u8; MAX_UNIFORM_BLOCK as usize + 1];
    fixture
        .gpu
        .begin_pass(RenderTarget::Screen, [0.0; 4])
        .unwrap();

    let result = fixture.gpu.set_uniforms(UniformSlot::Draw, &block);

    assert!(matches!(
        result,
        Err(Error::UniformBlockTooLarge { len, max }) if len == block.len() && max == MAX_UNIFORM_BLOCK
    ));
    assert!(
        !fixture
            .gpu
            .commands()
            .iter()
            .any(|c| matches!(c, Command::SetUniforms { .. }))
    );
}
