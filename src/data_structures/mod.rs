//! Scene data structures: attributes, objects, the scene and typed views over them.
//!
//! - `attribute` holds the dynamically typed value and the ordered key/value store
//! - `object` defines a named, tagged attribute bag
//! - `scene` is the ordered owner of all objects
//! - `transform` and `light` read well-known attributes into typed structs

pub mod attribute;
pub mod light;
pub mod object;
pub mod scene;
pub mod transform;
