use std::fmt;

use crate::{
    data_structures::attribute::{AttributeStore, AttributeType, AttributeValue},
    error::Result,
};

/// Identity of an object inside its [`Scene`](crate::data_structures::scene::Scene).
///
/// Assigned on insertion and never reused by the same scene, so it stays a valid key for removal
/// even after other objects were created or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named bag of tags and attributes.
///
/// Which passes an object takes part in is decided purely by its tags; what it looks like is
/// decided by its attributes.
#[derive(Debug, Clone)]
pub struct SceneObject {
    id: ObjectId,
    pub name: String,
    tags: Vec<String>,
    attributes: AttributeStore,
}

impl SceneObject {
    pub(crate) fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tags: Vec::new(),
            attributes: AttributeStore::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Exact, case-sensitive membership test.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Appends a tag. Duplicates are kept.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn get_attribute(&self, key: &str) -> Result<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn get_attribute_mut(&mut self, key: &str) -> Result<&mut AttributeValue> {
        self.attributes.get_mut(key)
    }

    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        self.attributes.set(key, value);
        self
    }

    /// Typed read of the first attribute stored under `key`.
    pub fn attribute<T: AttributeType>(&self, key: &str) -> Result<&T> {
        self.attributes.get_as(key)
    }

    pub fn attribute_mut<T: AttributeType>(&mut self, key: &str) -> Result<&mut T> {
        self.attributes.get_as_mut(key)
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }
}
