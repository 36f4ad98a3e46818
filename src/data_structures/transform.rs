//! Typed view over the `transform.*` attributes of a scene object.

use cgmath::{Deg, Matrix4, Vector3};

use crate::{
    data_structures::{attribute::keys, object::SceneObject},
    error::Result,
};

/// Position, rotation around Z (degrees) and non-uniform scale of a sprite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: f32,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: 0.0,
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Reads the three transform attributes, failing if any is missing or mistyped.
    pub fn from_object(object: &SceneObject) -> Result<Self> {
        Ok(Self {
            position: *object.attribute::<Vector3<f32>>(keys::POSITION)?,
            rotation: *object.attribute::<f32>(keys::ROTATION)?,
            scale: *object.attribute::<Vector3<f32>>(keys::SCALE)?,
        })
    }

    /// Stores the transform as attributes on a freshly created object.
    pub fn register(&self, object: &mut SceneObject) {
        object
            .set_attribute(keys::POSITION, self.position)
            .set_attribute(keys::ROTATION, self.rotation)
            .set_attribute(keys::SCALE, self.scale);
    }

    /// `translate * rotate_z * scale`.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_angle_z(Deg(self.rotation))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}
