//! Light parameters and their GPU-side representation.

use cgmath::Vector3;

use crate::{
    data_structures::{attribute::keys, object::SceneObject},
    error::Result,
};

/// Maximum number of lights the lighting pass reads. Further lights are dropped.
pub const MAX_LIGHTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Uniform ambient contribution, position is ignored.
    Global,
    /// Attenuated by distance and falloff, with a volumetric glow.
    Point,
}

impl LightKind {
    /// Interprets the `light.type` attribute. Anything but 0 counts as a point light.
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            LightKind::Global
        } else {
            LightKind::Point
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            LightKind::Global => 0,
            LightKind::Point => 1,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            LightKind::Global => LightKind::Point,
            LightKind::Point => LightKind::Global,
        }
    }
}

/// Non-positional parameters of a light object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub intensity: f32,
    /// Normalized RGB.
    pub color: Vector3<f32>,
    pub falloff: f32,
    pub volumetric_intensity: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            intensity: 100.0,
            color: Vector3::new(1.0, 1.0, 1.0),
            falloff: 0.1,
            volumetric_intensity: 0.1,
        }
    }
}

impl Light {
    pub fn from_object(object: &SceneObject) -> Result<Self> {
        Ok(Self {
            kind: LightKind::from_code(*object.attribute::<i32>(keys::LIGHT_TYPE)?),
            intensity: *object.attribute::<f32>(keys::LIGHT_INTENSITY)?,
            color: *object.attribute::<Vector3<f32>>(keys::LIGHT_COLOR)?,
            falloff: *object.attribute::<f32>(keys::LIGHT_FALLOFF)?,
            volumetric_intensity: *object.attribute::<f32>(keys::LIGHT_VOLUMETRIC_INTENSITY)?,
        })
    }

    pub fn register(&self, object: &mut SceneObject) {
        object
            .set_attribute(keys::LIGHT_TYPE, self.kind.code())
            .set_attribute(keys::LIGHT_INTENSITY, self.intensity)
            .set_attribute(keys::LIGHT_COLOR, self.color)
            .set_attribute(keys::LIGHT_FALLOFF, self.falloff)
            .set_attribute(keys::LIGHT_VOLUMETRIC_INTENSITY, self.volumetric_intensity);
    }

    pub fn to_raw(&self, position: Vector3<f32>) -> LightRaw {
        LightRaw {
            position: position.into(),
            kind: self.kind.code(),
            color: self.color.into(),
            intensity: self.intensity,
            falloff: self.falloff,
            volumetric_intensity: self.volumetric_intensity,
            _padding: [0.0; 2],
        }
    }
}

/// One entry of the light array as the lighting shader declares it.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightRaw {
    pub position: [f32; 3],
    pub kind: i32,
    pub color: [f32; 3],
    pub intensity: f32,
    pub falloff: f32,
    pub volumetric_intensity: f32,
    // Array stride in a uniform block is a multiple of 16 bytes
    pub _padding: [f32; 2],
}

/// The `Frame` block of the lighting pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub count: u32,
    pub _padding: u32,
    /// Half width and half height of the orthographic view in world units.
    pub half_extent: [f32; 2],
    pub lights: [LightRaw; MAX_LIGHTS],
}

impl LightsUniform {
    /// Packs lights in the given order, truncating to [`MAX_LIGHTS`].
    pub fn new(lights: &[LightRaw], half_extent: [f32; 2]) -> Self {
        let mut uniform: LightsUniform = bytemuck::Zeroable::zeroed();
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "{} lights in scene, only the first {} are rendered",
                lights.len(),
                MAX_LIGHTS
            );
        }
        let count = lights.len().min(MAX_LIGHTS);
        uniform.lights[..count].copy_from_slice(&lights[..count]);
        uniform.count = count as u32;
        uniform.half_extent = half_extent;
        uniform
    }

    pub fn active(&self) -> &[LightRaw] {
        &self.lights[..self.count as usize]
    }
}
