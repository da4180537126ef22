use id_arena::Id;

use crate::math::bounds::AABB;

pub type SceneModelId = Id<SceneModel>;

/// Geometry shared by renderable nodes. The core only needs the local-space
/// bounds for hit testing; the renderer draws them as tinted boxes.
pub struct SceneModel {
    pub name: String,
    pub bounds: AABB,
    pub color: [f32; 4],
}

impl SceneModel {
    pub fn new(name: impl Into<String>, bounds: AABB) -> Self {
        Self {
            name: name.into(),
            bounds,
            color: [0.6, 0.6, 0.6, 1.0],
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}
