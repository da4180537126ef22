use glam::Vec3;
use id_arena::Id;

use crate::scene_graph::scene::Scene;
use crate::scene_graph::scene_model::SceneModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

/// What a traversal may do with a node: groups are only descended into,
/// renderables are also intersection-tested and drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Renderable(SceneModelId),
}

pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    /// Set on the top node of a spawned actor; hits on any descendant resolve to it.
    pub actor_root: bool,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
    pub(crate) despawned: bool,
}

impl Object3D {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn renderable(name: impl Into<String>, model_id: SceneModelId) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Renderable(model_id),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.transform.set_translation(translation);
        self
    }

    pub fn model_id(&self) -> Option<SceneModelId> {
        match self.kind {
            NodeKind::Group => None,
            NodeKind::Renderable(model_id) => Some(model_id),
        }
    }

    pub fn parent<'a>(&self, scene: &'a Scene) -> Option<&'a Object3D> {
        self.parent_id.and_then(|id| scene.get_object(id))
    }

    pub fn children<'a, 'b>(&'a self, scene: &'b Scene) -> impl Iterator<Item = &'b Object3D> + 'b
    where
        'a: 'b,
    {
        self.child_ids
            .iter()
            .filter_map(move |id| scene.get_object(*id))
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            kind: NodeKind::Group,
            actor_root: false,
            parent_id: None,
            child_ids: Vec::new(),
            despawned: false,
        }
    }
}
