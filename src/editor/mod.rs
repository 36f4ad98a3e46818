//! Scene editing operations.
//!
//! [`Editor`] is what input handling calls into: it creates and removes objects, tracks the
//! selection and edits attributes of the selected object in place. Texture loading is the one
//! operation whose failure is reported and survived instead of propagated.
//!
//! Besides the dedicated transform and light edits, any scalar attribute of the selection can be
//! focused with [`Editor::focus_next_attribute`] and stepped with [`Editor::step_focused`].

use std::path::Path;

use cgmath::Vector3;

use crate::{
    data_structures::{
        attribute::{AttributeKind, AttributeType, keys, tags},
        light::{Light, LightKind},
        object::ObjectId,
        scene::Scene,
        transform::Transform,
    },
    error::Result,
    gpu::{Gpu, TextureId},
    resources::{
        ResourceRegistry,
        texture::{DefaultTextures, load_texture},
    },
};

use self::inspector::{AttributeStepper, inspect_object};

pub mod inspector;

#[derive(Debug)]
pub struct Editor {
    selected: Option<ObjectId>,
    focused: Option<String>,
    defaults: DefaultTextures,
    created: usize,
}

impl Editor {
    pub fn new(defaults: DefaultTextures) -> Self {
        Self {
            selected: None,
            focused: None,
            defaults,
            created: 0,
        }
    }

    pub fn defaults(&self) -> DefaultTextures {
        self.defaults
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    /// Changes the selection. The attribute focus does not carry over.
    pub fn select(&mut self, id: Option<ObjectId>) {
        self.selected = id;
        self.focused = None;
    }

    pub fn focused_attribute(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    fn next_name(&mut self, kind: &str) -> String {
        self.created += 1;
        format!("{kind} {}", self.created)
    }

    /// Adds an object without tags or attributes and selects it.
    pub fn new_object(&mut self, scene: &mut Scene) -> ObjectId {
        let name = self.next_name("Object");
        let id = scene.create(name).id();
        self.select(Some(id));
        id
    }

    /// Adds a sprite at the origin with the default textures and selects it.
    pub fn new_sprite(&mut self, scene: &mut Scene) -> ObjectId {
        let name = self.next_name("Sprite");
        let object = scene.create(name);
        object.add_tag(tags::SPRITE);
        Transform::default().register(object);
        object
            .set_attribute(keys::COLOR_TEXTURE, self.defaults.color)
            .set_attribute(keys::NORMAL_TEXTURE, self.defaults.normal);
        let id = object.id();
        self.select(Some(id));
        id
    }

    /// Adds a point light at the origin with default parameters and selects it.
    pub fn new_light(&mut self, scene: &mut Scene) -> ObjectId {
        let name = self.next_name("Light");
        let object = scene.create(name);
        object
            .add_tag(tags::LIGHT)
            .set_attribute(keys::POSITION, Vector3::new(0.0f32, 0.0, 0.0));
        Light::default().register(object);
        let id = object.id();
        self.select(Some(id));
        id
    }

    /// Removes `id` from the scene, clearing the selection if it pointed at it.
    pub fn remove_object(&mut self, scene: &mut Scene, id: ObjectId) -> bool {
        let removed = scene.remove(id).is_some();
        if self.selected == Some(id) {
            self.select(None);
        }
        removed
    }

    pub fn remove_selected(&mut self, scene: &mut Scene) -> bool {
        match self.selected {
            Some(id) => self.remove_object(scene, id),
            None => false,
        }
    }

    /// Moves the selection to the next object in scene order, wrapping around.
    pub fn select_next(&mut self, scene: &Scene) -> Option<ObjectId> {
        let objects = scene.objects();
        let next = match self.selected.and_then(|id| scene.index_of(id)) {
            Some(index) => objects.get((index + 1) % objects.len()),
            None => objects.first(),
        };
        self.select(next.map(|o| o.id()));
        self.selected
    }

    /// Adds `(dx, dy)` to the position of the selected object.
    ///
    /// Returns `false` without touching anything when nothing is selected or the object has no
    /// position.
    pub fn nudge(&mut self, scene: &mut Scene, dx: f32, dy: f32) -> Result<bool> {
        self.edit_selected(scene, keys::POSITION, |position: &mut Vector3<f32>| {
            position.x += dx;
            position.y += dy;
        })
    }

    pub fn rotate(&mut self, scene: &mut Scene, degrees: f32) -> Result<bool> {
        self.edit_selected(scene, keys::ROTATION, |rotation: &mut f32| {
            *rotation = (*rotation + degrees) % 360.0;
        })
    }

    /// Multiplies the scale of the selected object by `factor` on X and Y.
    pub fn scale_by(&mut self, scene: &mut Scene, factor: f32) -> Result<bool> {
        self.edit_selected(scene, keys::SCALE, |scale: &mut Vector3<f32>| {
            scale.x *= factor;
            scale.y *= factor;
        })
    }

    /// Switches the selected light between global and point.
    pub fn cycle_light_type(&mut self, scene: &mut Scene) -> Result<bool> {
        self.edit_selected(scene, keys::LIGHT_TYPE, |code: &mut i32| {
            *code = LightKind::from_code(*code).toggled().code();
        })
    }

    /// Multiplies the intensity of the selected light by `factor`.
    pub fn scale_light_intensity(&mut self, scene: &mut Scene, factor: f32) -> Result<bool> {
        self.edit_selected(scene, keys::LIGHT_INTENSITY, |intensity: &mut f32| {
            *intensity *= factor;
        })
    }

    pub fn scale_light_falloff(&mut self, scene: &mut Scene, factor: f32) -> Result<bool> {
        self.edit_selected(scene, keys::LIGHT_FALLOFF, |falloff: &mut f32| {
            *falloff *= factor;
        })
    }

    /// Adds `delta` to the volumetric intensity of the selected light, never going below zero.
    pub fn adjust_volumetric_intensity(&mut self, scene: &mut Scene, delta: f32) -> Result<bool> {
        self.edit_selected(
            scene,
            keys::LIGHT_VOLUMETRIC_INTENSITY,
            |volumetric: &mut f32| {
                *volumetric = (*volumetric + delta).max(0.0);
            },
        )
    }

    pub fn set_light_color(&mut self, scene: &mut Scene, color: Vector3<f32>) -> Result<bool> {
        self.edit_selected(scene, keys::LIGHT_COLOR, |current: &mut Vector3<f32>| {
            *current = color;
        })
    }

    /// Focuses the next int or float attribute of the selection in store order, wrapping around.
    ///
    /// Returns the focused key, or `None` when the selection has no scalar attribute.
    pub fn focus_next_attribute(&mut self, scene: &Scene) -> Option<&str> {
        let Some(object) = self.selected.and_then(|id| scene.get(id)) else {
            self.focused = None;
            return None;
        };
        let mut scalars: Vec<&str> = Vec::new();
        for (key, value) in object.attributes().iter() {
            let scalar = matches!(value.kind(), AttributeKind::Int | AttributeKind::Float);
            if scalar && !scalars.contains(&key) {
                scalars.push(key);
            }
        }
        let current = self
            .focused
            .as_deref()
            .and_then(|focused| scalars.iter().position(|key| *key == focused));
        let next = match current {
            Some(index) => scalars.get((index + 1) % scalars.len()),
            None => scalars.first(),
        };
        self.focused = next.map(|key| key.to_string());
        self.focused.as_deref()
    }

    /// Steps the focused attribute of the selection `steps` times.
    ///
    /// Returns `false` when nothing is focused or the focused key is gone.
    pub fn step_focused(&mut self, scene: &mut Scene, steps: i32) -> bool {
        let (Some(key), Some(object)) = (
            self.focused.as_deref(),
            self.selected.and_then(|id| scene.get_mut(id)),
        ) else {
            return false;
        };
        let mut stepper = AttributeStepper::new(key, steps);
        inspect_object(object, &mut stepper);
        if stepper.edited() {
            log::debug!("stepped `{}`.{key} by {steps}", object.name);
        }
        stepper.edited()
    }

    fn edit_selected<T: AttributeType>(
        &mut self,
        scene: &mut Scene,
        key: &str,
        edit: impl FnOnce(&mut T),
    ) -> Result<bool> {
        let Some(object) = self.selected.and_then(|id| scene.get_mut(id)) else {
            return Ok(false);
        };
        if !object.attributes().contains(key) {
            return Ok(false);
        }
        edit(object.attribute_mut::<T>(key)?);
        Ok(true)
    }

    /// Loads an image into the texture attribute `key` of object `id`.
    ///
    /// On failure the error is logged, the previous texture stays bound and `false` is returned.
    pub fn load_texture_attribute(
        &mut self,
        gpu: &mut dyn Gpu,
        registry: &mut ResourceRegistry,
        scene: &mut Scene,
        id: ObjectId,
        key: &str,
        path: impl AsRef<Path>,
    ) -> bool {
        let path = path.as_ref();
        let Some(object) = scene.get_mut(id) else {
            log::error!("cannot load {}: object {id} does not exist", path.display());
            return false;
        };
        let texture = match load_texture(gpu, registry, path) {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("failed to load texture {}: {e}", path.display());
                return false;
            }
        };
        if object.attributes().contains(key) {
            match object.attribute_mut::<TextureId>(key) {
                Ok(slot) => *slot = texture,
                Err(e) => {
                    log::error!("cannot assign texture to `{}`: {e}", object.name);
                    return false;
                }
            }
        } else {
            object.set_attribute(key.to_string(), texture);
        }
        log::info!("`{}`.{key} now uses {texture}", object.name);
        true
    }
}
