//! Angle-limited joint chains, such as the sandbox's robot arm.
//!
//! Each joint is a scene node rotating about one fixed local axis. Its angle is signed,
//! but limits are checked against the magnitude: a move of `delta` degrees is accepted
//! only when `min <= |angle| + delta <= max`, after which `angle -= delta`. Every check
//! is made against the stored angle, so rejected moves never accumulate.

use glam::{Quat, Vec3};
use id_arena::{Arena, Id};

use crate::error::{Result, SceneError};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene::Scene;
use crate::scene_graph::transform::Transform;

pub type JointId = Id<Joint>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    angle_degrees: f32,
    min_degrees: f32,
    max_degrees: f32,
}

impl JointState {
    pub fn new(angle_degrees: f32, min_degrees: f32, max_degrees: f32) -> Self {
        Self {
            angle_degrees,
            min_degrees: min_degrees.min(max_degrees),
            max_degrees: max_degrees.max(min_degrees),
        }
    }

    pub fn angle_degrees(&self) -> f32 {
        self.angle_degrees
    }

    pub fn min_degrees(&self) -> f32 {
        self.min_degrees
    }

    pub fn max_degrees(&self) -> f32 {
        self.max_degrees
    }

    fn in_limits(&self, magnitude: f32) -> bool {
        (self.min_degrees..=self.max_degrees).contains(&magnitude)
    }

    /// The angle a move would produce, or the magnitude that broke the limits.
    fn evaluate(&self, delta_degrees: f32) -> std::result::Result<f32, f32> {
        let attempted = self.angle_degrees.abs() + delta_degrees;
        if !self.in_limits(attempted) {
            return Err(attempted);
        }

        // A joint seeded with a positive angle moves away from `attempted`; never let
        // that leave the stored angle outside its limits.
        let next = self.angle_degrees - delta_degrees;
        if !self.in_limits(next.abs()) {
            return Err(next.abs());
        }

        Ok(next)
    }
}

/// Creation parameters for one joint.
#[derive(Debug, Clone)]
pub struct JointDescriptor {
    pub name: String,
    /// Position of the joint pivot in its parent's space.
    pub offset: Vec3,
    /// Local rotation axis. Normalized on creation.
    pub axis: Vec3,
    pub rest_rotation: Quat,
    pub initial_degrees: f32,
    pub min_degrees: f32,
    pub max_degrees: f32,
}

impl JointDescriptor {
    pub fn new(name: impl Into<String>, offset: Vec3, axis: Vec3) -> Self {
        Self {
            name: name.into(),
            offset,
            axis,
            rest_rotation: Quat::IDENTITY,
            initial_degrees: 0.0,
            min_degrees: 0.0,
            max_degrees: 360.0,
        }
    }

    pub fn with_limits(mut self, min_degrees: f32, max_degrees: f32) -> Self {
        self.min_degrees = min_degrees;
        self.max_degrees = max_degrees;
        self
    }

    pub fn with_initial_degrees(mut self, initial_degrees: f32) -> Self {
        self.initial_degrees = initial_degrees;
        self
    }
}

pub struct Joint {
    pub name: String,
    node: ObjectId,
    axis: Vec3,
    rest_rotation: Quat,
    state: JointState,
}

impl Joint {
    pub fn node(&self) -> ObjectId {
        self.node
    }

    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    pub fn state(&self) -> &JointState {
        &self.state
    }

    fn rotation_for(&self, angle_degrees: f32) -> Quat {
        self.rest_rotation * Quat::from_axis_angle(self.axis, angle_degrees.to_radians())
    }
}

/// A linkage of joints hanging below a common root node.
pub struct ArticulatedChain {
    root: ObjectId,
    joints: Arena<Joint>,
}

impl ArticulatedChain {
    pub fn new(root: ObjectId) -> Self {
        Self {
            root,
            joints: Arena::new(),
        }
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Creates the joint's pivot node under `parent` (the chain root or another joint's
    /// node) and returns the handle used for all later commands.
    pub fn add_joint(
        &mut self,
        scene: &mut Scene,
        parent: ObjectId,
        descriptor: JointDescriptor,
    ) -> Result<JointId> {
        let axis = descriptor.axis.try_normalize().unwrap_or(Vec3::Z);
        let joint = Joint {
            name: descriptor.name,
            node: parent,
            axis,
            rest_rotation: descriptor.rest_rotation,
            state: JointState::new(
                descriptor.initial_degrees,
                descriptor.min_degrees,
                descriptor.max_degrees,
            ),
        };

        let pivot = Object3D::group(joint.name.clone()).with_transform(Transform::new(
            descriptor.offset,
            joint.rotation_for(descriptor.initial_degrees),
            Vec3::ONE,
        ));
        let node = scene.add_child(parent, pivot)?;

        Ok(self.joints.alloc(Joint { node, ..joint }))
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id)
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        self.joints.iter()
    }

    /// Sweeps a joint by `delta_degrees` and returns the new signed angle.
    ///
    /// A move outside the joint's limits fails with `ConstraintViolation` and leaves
    /// both the joint state and the scene untouched.
    pub fn rotate(&mut self, scene: &mut Scene, id: JointId, delta_degrees: f32) -> Result<f32> {
        let joint = self.joints.get_mut(id).ok_or(SceneError::UnknownJoint(id))?;

        let next = joint
            .state
            .evaluate(delta_degrees)
            .map_err(|attempted| SceneError::ConstraintViolation {
                joint: id,
                attempted,
                min: joint.state.min_degrees,
                max: joint.state.max_degrees,
            })?;

        scene.set_object_rotation(joint.node, joint.rotation_for(next))?;
        joint.state.angle_degrees = next;

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_joint(min: f32, max: f32, initial: f32) -> (Scene, ArticulatedChain, JointId) {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::group("arm"));
        let mut chain = ArticulatedChain::new(root);
        let joint = chain
            .add_joint(
                &mut scene,
                root,
                JointDescriptor::new("shoulder", Vec3::ZERO, Vec3::Z)
                    .with_limits(min, max)
                    .with_initial_degrees(initial),
            )
            .unwrap();
        (scene, chain, joint)
    }

    fn angle(chain: &ArticulatedChain, joint: JointId) -> f32 {
        chain.joint(joint).unwrap().state().angle_degrees()
    }

    #[test]
    fn increments_below_minimum_are_rejected_without_drift() {
        let (mut scene, mut chain, joint) = single_joint(50.0, 300.0, 0.0);

        for _ in 0..5 {
            let result = chain.rotate(&mut scene, joint, 10.0);
            assert!(matches!(
                result,
                Err(SceneError::ConstraintViolation { attempted, .. }) if attempted == 10.0
            ));
            assert_eq!(angle(&chain, joint), 0.0);
        }

        assert_eq!(chain.rotate(&mut scene, joint, 50.0), Ok(-50.0));
        assert_eq!(chain.rotate(&mut scene, joint, 10.0), Ok(-60.0));
        assert_eq!(angle(&chain, joint), -60.0);
    }

    #[test]
    fn moves_past_maximum_are_rejected() {
        let (mut scene, mut chain, joint) = single_joint(0.0, 90.0, 0.0);

        assert_eq!(chain.rotate(&mut scene, joint, 80.0), Ok(-80.0));
        assert!(chain.rotate(&mut scene, joint, 20.0).is_err());
        assert_eq!(angle(&chain, joint), -80.0);
        assert_eq!(chain.rotate(&mut scene, joint, 10.0), Ok(-90.0));
    }

    #[test]
    fn negative_delta_sweeps_back() {
        let (mut scene, mut chain, joint) = single_joint(0.0, 90.0, -45.0);

        assert_eq!(chain.rotate(&mut scene, joint, -15.0), Ok(-30.0));
        assert!(chain.rotate(&mut scene, joint, -40.0).is_err());
        assert_eq!(angle(&chain, joint), -30.0);
    }

    #[test]
    fn rotation_is_applied_to_the_scene_node() {
        let (mut scene, mut chain, joint) = single_joint(0.0, 180.0, 0.0);
        let node = chain.joint(joint).unwrap().node();
        let tip = scene
            .add_child(node, Object3D::group("tip").with_translation(Vec3::X))
            .unwrap();

        chain.rotate(&mut scene, joint, 90.0).unwrap();

        let position = scene.world_matrix(tip).unwrap().transform_point3(Vec3::ZERO);
        assert!((position - Vec3::NEG_Y).length() < 1e-5, "tip at {position}");
    }

    #[test]
    fn nested_joints_compose() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::group("arm"));
        let mut chain = ArticulatedChain::new(root);
        let shoulder = chain
            .add_joint(&mut scene, root, JointDescriptor::new("shoulder", Vec3::ZERO, Vec3::Z))
            .unwrap();
        let shoulder_node = chain.joint(shoulder).unwrap().node();
        let elbow = chain
            .add_joint(
                &mut scene,
                shoulder_node,
                JointDescriptor::new("elbow", Vec3::X, Vec3::Z),
            )
            .unwrap();
        let elbow_node = chain.joint(elbow).unwrap().node();

        chain.rotate(&mut scene, shoulder, 90.0).unwrap();

        let position = scene
            .world_matrix(elbow_node)
            .unwrap()
            .transform_point3(Vec3::ZERO);
        assert!((position - Vec3::NEG_Y).length() < 1e-5, "elbow at {position}");
    }

    #[test]
    fn rotating_a_removed_joint_node_fails_cleanly() {
        let (mut scene, mut chain, joint) = single_joint(0.0, 180.0, 0.0);
        let node = chain.joint(joint).unwrap().node();
        scene.despawn(node).unwrap();

        assert_eq!(
            chain.rotate(&mut scene, joint, 10.0),
            Err(SceneError::UnknownNode(node))
        );
        assert_eq!(angle(&chain, joint), 0.0);
    }

    proptest! {
        #[test]
        fn limits_hold_after_any_command_sequence(
            min in 0.0f32..90.0,
            span in 0.0f32..270.0,
            seed in -1.0f32..1.0,
            deltas in prop::collection::vec(-120.0f32..120.0, 0..64),
        ) {
            let max = min + span;
            let (mut scene, mut chain, joint) = single_joint(min, max, seed * max);

            for delta in deltas {
                let before = angle(&chain, joint);
                match chain.rotate(&mut scene, joint, delta) {
                    Ok(next) => {
                        prop_assert_eq!(next, before - delta);
                        prop_assert!(min <= next.abs() && next.abs() <= max);
                    }
                    Err(error) => {
                        let is_violation =
                            matches!(error, SceneError::ConstraintViolation { .. });
                        prop_assert!(is_violation);
                        prop_assert_eq!(angle(&chain, joint), before);
                    }
                }
            }
        }
    }
}
