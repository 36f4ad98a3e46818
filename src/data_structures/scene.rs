//! The ordered collection of everything that gets edited and drawn.

use crate::data_structures::object::{ObjectId, SceneObject};

/// Sole owner of all scene objects.
///
/// Insertion order is preserved and is the order in which objects are drawn, aggregated as lights
/// and listed in the inspector.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an empty object and hands it back for further setup.
    pub fn create(&mut self, name: impl Into<String>) -> &mut SceneObject {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let object = SceneObject::new(id, name);
        log::debug!("created object {} `{}`", id, object.name);
        self.objects.push(object);
        let last = self.objects.len() - 1;
        &mut self.objects[last]
    }

    /// Removes the object with the given identity, keeping the order of the others.
    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let index = self.index_of(id)?;
        let object = self.objects.remove(index);
        log::debug!("removed object {} `{}`", id, object.name);
        Some(object)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.iter_mut()
    }

    /// Objects carrying `tag`, in scene order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a SceneObject> + 'a {
        self.objects.iter().filter(move |o| o.has_tag(tag))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
