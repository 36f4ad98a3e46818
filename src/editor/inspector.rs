//! Exhaustive visitation of object attributes.
//!
//! An inspector front end implements [`AttributeWidgets`], one method per attribute variant, and
//! gets mutable access to every value in scene order. Adding a variant to
//! [`AttributeValue`] fails to compile here until every front end handles it.

use std::fmt::Write;

use cgmath::{Matrix4, Vector2, Vector3, Vector4};

use crate::{
    data_structures::{
        attribute::AttributeValue,
        object::{ObjectId, SceneObject},
        scene::Scene,
    },
    gpu::TextureId,
};

pub trait AttributeWidgets {
    fn begin_object(&mut self, _id: ObjectId, _name: &str, _tags: &[String]) {}
    fn end_object(&mut self, _id: ObjectId) {}

    fn int(&mut self, key: &str, value: &mut i32);
    fn float(&mut self, key: &str, value: &mut f32);
    fn vec2(&mut self, key: &str, value: &mut Vector2<f32>);
    fn vec3(&mut self, key: &str, value: &mut Vector3<f32>);
    fn vec4(&mut self, key: &str, value: &mut Vector4<f32>);
    fn mat4(&mut self, key: &str, value: &mut Matrix4<f32>);
    fn texture(&mut self, key: &str, value: &mut TextureId);
}

pub fn inspect_object(object: &mut SceneObject, widgets: &mut dyn AttributeWidgets) {
    let id = object.id();
    widgets.begin_object(id, &object.name, object.tags());
    for (key, value) in object.attributes_mut().iter_mut() {
        match value {
            AttributeValue::Int(v) => widgets.int(key, v),
            AttributeValue::Float(v) => widgets.float(key, v),
            AttributeValue::Vec2(v) => widgets.vec2(key, v),
            AttributeValue::Vec3(v) => widgets.vec3(key, v),
            AttributeValue::Vec4(v) => widgets.vec4(key, v),
            AttributeValue::Mat4(v) => widgets.mat4(key, v),
            AttributeValue::Texture(v) => widgets.texture(key, v),
        }
    }
    widgets.end_object(id);
}

pub fn inspect_scene(scene: &mut Scene, widgets: &mut dyn AttributeWidgets) {
    for object in scene.iter_mut() {
        inspect_object(object, widgets);
    }
}

/// Plain-text inspector, one line per object header and per attribute.
#[derive(Debug, Default)]
pub struct InspectorReport {
    text: String,
}

impl InspectorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_scene(scene: &mut Scene) -> String {
        let mut report = Self::new();
        inspect_scene(scene, &mut report);
        report.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn line(&mut self, key: &str, value: std::fmt::Arguments<'_>) {
        // Writing into a String cannot fail
        let _ = writeln!(self.text, "  {key} = {value}");
    }
}

impl AttributeWidgets for InspectorReport {
    fn begin_object(&mut self, id: ObjectId, name: &str, tags: &[String]) {
        let _ = writeln!(self.text, "{name} {id} [{}]", tags.join(", "));
    }

    fn int(&mut self, key: &str, value: &mut i32) {
        self.line(key, format_args!("{value}"));
    }

    fn float(&mut self, key: &str, value: &mut f32) {
        self.line(key, format_args!("{value}"));
    }

    fn vec2(&mut self, key: &str, value: &mut Vector2<f32>) {
        self.line(key, format_args!("({}, {})", value.x, value.y));
    }

    fn vec3(&mut self, key: &str, value: &mut Vector3<f32>) {
        self.line(key, format_args!("({}, {}, {})", value.x, value.y, value.z));
    }

    fn vec4(&mut self, key: &str, value: &mut Vector4<f32>) {
        self.line(
            key,
            format_args!("({}, {}, {}, {})", value.x, value.y, value.z, value.w),
        );
    }

    fn mat4(&mut self, key: &str, value: &mut Matrix4<f32>) {
        let columns: [[f32; 4]; 4] = (*value).into();
        self.line(key, format_args!("{columns:?}"));
    }

    fn texture(&mut self, key: &str, value: &mut TextureId) {
        self.line(key, format_args!("{value}"));
    }
}

/// Relative size of one float step.
const FLOAT_STEP: f32 = 0.1;
/// Smallest float step, so values can move away from zero.
const MIN_FLOAT_STEP: f32 = 0.01;

/// Keyboard counterpart of a slider: steps the first int or float attribute named `key`.
///
/// Ints move by whole steps. Floats move by a tenth of their magnitude per step (at least
/// `0.01`), which keeps both an intensity of 100 and a falloff of 0.1 adjustable.
#[derive(Debug)]
pub struct AttributeStepper<'a> {
    key: &'a str,
    steps: i32,
    edited: bool,
}

impl<'a> AttributeStepper<'a> {
    pub fn new(key: &'a str, steps: i32) -> Self {
        Self {
            key,
            steps,
            edited: false,
        }
    }

    pub fn edited(&self) -> bool {
        self.edited
    }

    fn claims(&mut self, key: &str) -> bool {
        if self.edited || key != self.key {
            return false;
        }
        self.edited = true;
        true
    }
}

impl AttributeWidgets for AttributeStepper<'_> {
    fn int(&mut self, key: &str, value: &mut i32) {
        if self.claims(key) {
            *value += self.steps;
        }
    }

    fn float(&mut self, key: &str, value: &mut f32) {
        if self.claims(key) {
            let step = (value.abs() * FLOAT_STEP).max(MIN_FLOAT_STEP);
            *value += step * self.steps as f32;
        }
    }

    fn vec2(&mut self, _key: &str, _value: &mut Vector2<f32>) {}
    fn vec3(&mut self, _key: &str, _value: &mut Vector3<f32>) {}
    fn vec4(&mut self, _key: &str, _value: &mut Vector4<f32>) {}
    fn mat4(&mut self, _key: &str, _value: &mut Matrix4<f32>) {}
    fn texture(&mut self, _key: &str, _value: &mut TextureId) {}
}
