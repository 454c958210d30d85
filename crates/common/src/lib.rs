//! Shared types: object identifiers, object attributes, partial updates.

mod types;

pub use types::{Axis, ObjectId, ObjectPatch, ParseObjectIdError, SceneObject};
