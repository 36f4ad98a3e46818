//! Dynamically typed, string-keyed attributes.
//!
//! Scene objects carry no fixed fields besides their name and tags; everything the renderer and
//! the editor need (transform, textures, light parameters) lives in an [`AttributeStore`]. The
//! value type is the closed sum [`AttributeValue`], and typed reads go through [`AttributeType`]
//! so that asking for the wrong variant is an error rather than a silent reinterpretation.

use std::fmt;

use cgmath::{Matrix4, Vector2, Vector3, Vector4};

use crate::{
    error::{Error, Result},
    gpu::TextureId,
};

/// Well-known attribute keys.
pub mod keys {
    pub const POSITION: &str = "transform.position";
    pub const SCALE: &str = "transform.scale";
    /// Rotation around Z in degrees.
    pub const ROTATION: &str = "transform.rotation";
    pub const COLOR_TEXTURE: &str = "texture.color";
    pub const NORMAL_TEXTURE: &str = "texture.normal";
    pub const LIGHT_TYPE: &str = "light.type";
    pub const LIGHT_INTENSITY: &str = "light.intensity";
    pub const LIGHT_COLOR: &str = "light.color";
    pub const LIGHT_FALLOFF: &str = "light.falloff";
    pub const LIGHT_VOLUMETRIC_INTENSITY: &str = "light.volumetric_intensity";
}

/// Well-known tags.
pub mod tags {
    /// Drawn by the color and normal passes.
    pub const SPRITE: &str = "sprite";
    /// Collected into the lighting pass.
    pub const LIGHT: &str = "light";
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    Int(i32),
    Float(f32),
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat4(Matrix4<f32>),
    Texture(TextureId),
}

/// The variant tag of an [`AttributeValue`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Texture,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Int => "int",
            AttributeKind::Float => "float",
            AttributeKind::Vec2 => "vec2",
            AttributeKind::Vec3 => "vec3",
            AttributeKind::Vec4 => "vec4",
            AttributeKind::Mat4 => "mat4",
            AttributeKind::Texture => "texture",
        };
        f.write_str(name)
    }
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::Vec2(_) => AttributeKind::Vec2,
            AttributeValue::Vec3(_) => AttributeKind::Vec3,
            AttributeValue::Vec4(_) => AttributeKind::Vec4,
            AttributeValue::Mat4(_) => AttributeKind::Mat4,
            AttributeValue::Texture(_) => AttributeKind::Texture,
        }
    }
}

/// A Rust type that corresponds to exactly one [`AttributeValue`] variant.
pub trait AttributeType: Sized {
    const KIND: AttributeKind;

    fn from_value(value: &AttributeValue) -> Option<&Self>;
    fn from_value_mut(value: &mut AttributeValue) -> Option<&mut Self>;
    fn into_value(self) -> AttributeValue;
}

macro_rules! attribute_type {
    ($ty:ty, $variant:ident) => {
        impl AttributeType for $ty {
            const KIND: AttributeKind = AttributeKind::$variant;

            fn from_value(value: &AttributeValue) -> Option<&Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut AttributeValue) -> Option<&mut Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }
        }

        impl From<$ty> for AttributeValue {
            fn from(value: $ty) -> Self {
                AttributeValue::$variant(value)
            }
        }
    };
}

attribute_type!(i32, Int);
attribute_type!(f32, Float);
attribute_type!(Vector2<f32>, Vec2);
attribute_type!(Vector3<f32>, Vec3);
attribute_type!(Vector4<f32>, Vec4);
attribute_type!(Matrix4<f32>, Mat4);
attribute_type!(TextureId, Texture);

/// Ordered, append-only key/value bag.
///
/// [`set`](Self::set) never overwrites: a second entry under an existing key is stored but stays
/// invisible to lookups, which always return the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    entries: Vec<(String, AttributeValue)>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        log::debug!("registered attribute {key} ({})", value.kind());
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Result<&AttributeValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::AttributeNotFound(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut AttributeValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::AttributeNotFound(key.to_string()))
    }

    pub fn get_as<T: AttributeType>(&self, key: &str) -> Result<&T> {
        let value = self.get(key)?;
        let found = value.kind();
        T::from_value(value).ok_or_else(|| mismatch::<T>(key, found))
    }

    pub fn get_as_mut<T: AttributeType>(&mut self, key: &str) -> Result<&mut T> {
        let value = self.get_mut(key)?;
        let found = value.kind();
        T::from_value_mut(value).ok_or_else(|| mismatch::<T>(key, found))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order, shadowed duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut AttributeValue)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

fn mismatch<T: AttributeType>(key: &str, found: AttributeKind) -> Error {
    Error::AttributeTypeMismatch {
        key: key.to_string(),
        expected: T::KIND,
        found,
    }
}
