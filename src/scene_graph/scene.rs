use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;

use crate::error::{Result, SceneError};
use crate::scene_graph::object3d::{NodeKind, Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};
use crate::scene_graph::transform::Transform;

/// Arena-backed node forest.
///
/// Nodes reference each other only by `ObjectId`. Despawned nodes keep their arena
/// slot but are invisible to every lookup, so a stale id simply resolves to `None`.
pub struct Scene {
    objects: Arena<Object3D>,
    models: Arena<SceneModel>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
        }
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    pub fn get_model(&self, id: SceneModelId) -> Option<&SceneModel> {
        self.models.get(id)
    }

    /// Adds a new root node.
    pub fn add_object(&mut self, mut object: Object3D) -> ObjectId {
        object.parent_id = None;
        object.child_ids.clear();
        object.despawned = false;
        // The transform may carry a cached matrix from another place in a hierarchy.
        object.transform.invalidate_world();
        self.objects.alloc(object)
    }

    /// Adds a node as the last child of `parent`.
    pub fn add_child(&mut self, parent: ObjectId, object: Object3D) -> Result<ObjectId> {
        if !self.is_alive(parent) {
            return Err(SceneError::UnknownNode(parent));
        }

        if self.find_child(parent, &object.name).is_some() {
            log::warn!(
                "Node {:?} already has a child named {:?}; lookups by name return the first",
                parent,
                object.name
            );
        }

        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent))?;
        Ok(object_id)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id).filter(|object| !object.despawned)
    }

    fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object3D> {
        self.objects.get_mut(id).filter(|object| !object.despawned)
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.get_object(id).is_some()
    }

    /// Live nodes without a parent, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .iter()
            .filter(|(_, object)| !object.despawned && object.parent_id.is_none())
            .map(|(id, _)| id)
    }

    /// First live child of `parent` called `name`.
    pub fn find_child(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.get_object(parent)?
            .child_ids
            .iter()
            .copied()
            .find(|&id| self.get_object(id).is_some_and(|child| child.name == name))
    }

    pub fn object_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|(_, object)| !object.despawned)
            .count()
    }

    /// Depth-first, pre-order walk of the subtree rooted at `root` (inclusive).
    /// Uses an explicit stack so nesting depth is bounded only by memory.
    pub fn descendants(&self, root: ObjectId) -> Descendants<'_> {
        let stack = if self.is_alive(root) {
            vec![root]
        } else {
            Vec::new()
        };

        Descendants { scene: self, stack }
    }

    /// Live renderable nodes with their model, in depth-first order from every root.
    pub fn renderables(&self) -> impl Iterator<Item = (ObjectId, &Object3D, &SceneModel)> + '_ {
        self.roots()
            .flat_map(move |root| self.descendants(root))
            .filter_map(move |id| {
                let object = self.get_object(id)?;
                match object.kind {
                    NodeKind::Group => None,
                    NodeKind::Renderable(model_id) => {
                        Some((id, object, self.models.get(model_id)?))
                    }
                }
            })
    }

    /// Walks ancestors (including `id` itself) until a node flagged as an actor root.
    pub fn logical_owner(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = Some(id);

        while let Some(current_id) = current {
            let object = self.get_object(current_id)?;
            if object.actor_root {
                return Some(current_id);
            }
            current = object.parent_id;
        }

        None
    }

    /// World transform of `id`, composed from its ancestors' local transforms.
    ///
    /// Cached matrices are reused only while their dirty flag is clear; since every
    /// mutation dirties the whole subtree below it, a clean node always has a clean,
    /// up-to-date chain above it.
    pub fn world_matrix(&self, id: ObjectId) -> Option<Mat4> {
        let mut chain = Vec::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            let object = self.get_object(current_id)?;
            chain.push(object);
            if !object.transform.is_world_dirty() {
                break;
            }
            current = object.parent_id;
        }

        let mut parent_world = Mat4::IDENTITY;
        for object in chain.into_iter().rev() {
            let transform = &object.transform;
            if transform.is_world_dirty() {
                let world = parent_world * transform.local_matrix();
                transform.set_world_matrix(world);
                parent_world = world;
            } else {
                parent_world = transform.cached_world_matrix();
            }
        }

        Some(parent_world)
    }

    /// Refreshes every dirty world matrix, parents before children.
    fn update_transforms(&self) {
        let roots: Vec<ObjectId> = self.roots().collect();
        let mut stack: Vec<(ObjectId, Mat4)> =
            roots.into_iter().map(|id| (id, Mat4::IDENTITY)).collect();

        while let Some((object_id, parent_world_matrix)) = stack.pop() {
            let Some(object) = self.get_object(object_id) else {
                continue;
            };

            if object.transform.is_world_dirty() {
                let world_matrix = parent_world_matrix * object.transform.local_matrix();
                object.transform.set_world_matrix(world_matrix);
            }

            let world_matrix = object.transform.cached_world_matrix();
            for &child_id in &object.child_ids {
                stack.push((child_id, world_matrix));
            }
        }
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        for id in self.descendants(object_id) {
            if let Some(object) = self.get_object(id) {
                object.transform.invalidate_world();
            }
        }
    }

    /// Sets the parent of an object and updates child relationships.
    /// Reparenting a node under itself or one of its descendants is refused.
    pub fn set_object_parent(
        &mut self,
        child_id: ObjectId,
        new_parent_id: Option<ObjectId>,
    ) -> Result<()> {
        if !self.is_alive(child_id) {
            return Err(SceneError::UnknownNode(child_id));
        }

        if let Some(new_parent_id) = new_parent_id {
            if !self.is_alive(new_parent_id) {
                return Err(SceneError::UnknownNode(new_parent_id));
            }
            if self.descendants(child_id).any(|id| id == new_parent_id) {
                return Err(SceneError::CyclicParent {
                    child: child_id,
                    parent: new_parent_id,
                });
            }
        }

        // Remove from old parent's children list
        if let Some(old_parent_id) = self.get_object(child_id).and_then(|c| c.parent_id) {
            if let Some(old_parent) = self.get_object_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.get_object_mut(child_id) {
            child.parent_id = new_parent_id;
        }

        if let Some(new_parent_id) = new_parent_id {
            if let Some(new_parent) = self.get_object_mut(new_parent_id) {
                new_parent.child_ids.push(child_id);
            }
        }

        self.invalidate_object_hierarchy(child_id);
        Ok(())
    }

    /// Detaches `id` from its parent and removes it together with its whole subtree.
    /// Returns the number of nodes removed.
    pub fn despawn(&mut self, id: ObjectId) -> Result<usize> {
        if !self.is_alive(id) {
            return Err(SceneError::UnknownNode(id));
        }

        self.set_object_parent(id, None)?;

        let subtree: Vec<ObjectId> = self.descendants(id).collect();
        for &node_id in &subtree {
            if let Some(object) = self.objects.get_mut(node_id) {
                object.despawned = true;
                object.child_ids.clear();
            }
        }

        Ok(subtree.len())
    }

    fn modify_transform(
        &mut self,
        object_id: ObjectId,
        modify: impl FnOnce(&mut Transform),
    ) -> Result<()> {
        let object = self
            .get_object_mut(object_id)
            .ok_or(SceneError::UnknownNode(object_id))?;
        modify(&mut object.transform);
        self.invalidate_object_hierarchy(object_id);
        Ok(())
    }

    pub fn set_object_translation(&mut self, object_id: ObjectId, translation: Vec3) -> Result<()> {
        self.modify_transform(object_id, |t| t.set_translation(translation))
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) -> Result<()> {
        self.modify_transform(object_id, |t| t.set_rotation(rotation))
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: Vec3) -> Result<()> {
        self.modify_transform(object_id, |t| t.set_scale(scale))
    }

    pub fn set_object_transform(
        &mut self,
        object_id: ObjectId,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Result<()> {
        self.modify_transform(object_id, |t| t.set_transform(translation, rotation, scale))
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.get_object(object_id).map(|object| &object.transform)
    }

    pub fn late_update(&mut self) {
        self.update_transforms();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Descendants<'a> {
    scene: &'a Scene,
    stack: Vec<ObjectId>,
}

impl Iterator for Descendants<'_> {
    type Item = ObjectId;

    fn next(&mut self) -> Option<ObjectId> {
        let id = self.stack.pop()?;
        if let Some(object) = self.scene.get_object(id) {
            self.stack.extend(object.child_ids.iter().rev().copied());
        }
        Some(id)
    }
}
