use glam::{Vec2, Vec3};
use itertools::Itertools;

use crate::camera::Camera;
use crate::math::ray::Ray;
use crate::scene_graph::object3d::{NodeKind, ObjectId};
use crate::scene_graph::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub object: ObjectId,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
}

/// Hits ordered nearest first.
pub type HitResult = Vec<Hit>;

/// Raycasts pointer positions against the renderable leaves of a scene.
#[derive(Debug, Default)]
pub struct HitTester {
    stack: Vec<ObjectId>,
}

impl HitTester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every renderable under `roots` hit by the ray through `ndc`, nearest first.
    pub fn pick(
        &mut self,
        ndc: Vec2,
        camera: &Camera,
        scene: &Scene,
        roots: &[ObjectId],
    ) -> HitResult {
        let ray = camera.ray_from_ndc(ndc);
        self.pick_ray(&ray, scene, roots)
    }

    pub fn pick_ray(&mut self, ray: &Ray, scene: &Scene, roots: &[ObjectId]) -> HitResult {
        self.stack.clear();
        self.stack.extend(roots.iter().rev().copied());

        let mut hits = Vec::new();

        while let Some(id) = self.stack.pop() {
            let Some(object) = scene.get_object(id) else {
                continue;
            };

            self.stack.extend(object.child_ids.iter().rev().copied());

            let NodeKind::Renderable(model_id) = object.kind else {
                continue;
            };
            let Some(model) = scene.get_model(model_id) else {
                continue;
            };
            let Some(world) = scene.world_matrix(id) else {
                continue;
            };

            // Degenerate (zero-scale) nodes invert to non-finite values.
            let local_ray = ray.transformed(&world.inverse());
            if !local_ray.origin.is_finite() || !local_ray.direction.is_finite() {
                continue;
            }

            if let Some(distance) = model.bounds.intersect_ray(&local_ray) {
                hits.push(Hit {
                    object: id,
                    distance,
                    point: ray.at(distance),
                });
            }
        }

        hits.into_iter()
            .sorted_by(|a, b| a.distance.total_cmp(&b.distance))
            .collect()
    }

    /// The actor a hit node belongs to; see [`Scene::logical_owner`].
    pub fn logical_owner(&self, scene: &Scene, node: ObjectId) -> Option<ObjectId> {
        scene.logical_owner(node)
    }

    /// The actor owning the nearest hit that belongs to any actor.
    pub fn nearest_owner(&self, scene: &Scene, hits: &[Hit]) -> Option<(ObjectId, Hit)> {
        hits.iter()
            .find_map(|hit| Some((self.logical_owner(scene, hit.object)?, *hit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraConfig, CameraId, CameraPose, Projection};
    use crate::math::bounds::AABB;
    use crate::scene_graph::object3d::Object3D;
    use crate::scene_graph::scene_model::SceneModel;

    fn camera() -> Camera {
        Camera::from_config(CameraConfig {
            id: CameraId::Front,
            projection: Projection::Perspective {
                fov_y_degrees: 60.0,
                aspect: 1.0,
                near: 0.1,
                far: 100.0,
            },
            pose: CameraPose::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO),
        })
    }

    /// Two unit boxes on the view axis whose front faces are 5 and 10 units away.
    fn overlapping_scene() -> (Scene, ObjectId, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let model = scene.add_model(SceneModel::new("box", AABB::from_size(Vec3::ONE)));
        let root = scene.add_object(Object3D::group("root"));
        let far = scene
            .add_child(
                root,
                Object3D::renderable("far", model).with_translation(Vec3::new(0.0, 0.0, -0.5)),
            )
            .unwrap();
        let group = scene.add_child(root, Object3D::group("group")).unwrap();
        let near = scene
            .add_child(
                group,
                Object3D::renderable("near", model).with_translation(Vec3::new(0.0, 0.0, 4.5)),
            )
            .unwrap();
        (scene, root, near, far)
    }

    #[test]
    fn hits_are_sorted_nearest_first() {
        let (scene, root, near, far) = overlapping_scene();
        let hits = HitTester::new().pick(Vec2::ZERO, &camera(), &scene, &[root]);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].object, near);
        assert_eq!(hits[1].object, far);
        assert!((hits[0].distance - 5.0).abs() < 1e-4);
        assert!((hits[1].distance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn miss_returns_empty() {
        let (scene, root, _, _) = overlapping_scene();
        let hits = HitTester::new().pick(Vec2::new(0.9, 0.9), &camera(), &scene, &[root]);
        assert!(hits.is_empty());
    }

    #[test]
    fn groups_are_never_hit_directly() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::group("root"));
        let hits = HitTester::new().pick(Vec2::ZERO, &camera(), &scene, &[root]);
        assert!(hits.is_empty());
    }

    #[test]
    fn hit_respects_node_rotation_and_scale() {
        let mut scene = Scene::new();
        let model = scene.add_model(SceneModel::new(
            "plank",
            AABB::new(Vec3::ZERO, Vec3::new(4.0, 0.2, 0.2)),
        ));
        let mut plank = Object3D::renderable("plank", model);
        plank.transform.set_rotation(glam::Quat::from_rotation_z(
            std::f32::consts::FRAC_PI_2,
        ));
        plank.transform.set_scale(Vec3::splat(2.0));
        let plank = scene.add_object(plank);

        // Rotated onto +Y and doubled, the plank spans y in [0, 8] at x close to 0.
        let ray = Ray::new(Vec3::new(-0.2, 6.0, 10.0), Vec3::NEG_Z);
        let hits = HitTester::new().pick_ray(&ray, &scene, &[plank]);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 9.6).abs() < 1e-4);

        let miss = Ray::new(Vec3::new(-0.2, 9.0, 10.0), Vec3::NEG_Z);
        assert!(HitTester::new().pick_ray(&miss, &scene, &[plank]).is_empty());
    }

    #[test]
    fn off_axis_hit_beyond_far_distance_is_kept() {
        let camera = Camera::from_config(CameraConfig {
            id: CameraId::Perspective,
            projection: Projection::Perspective {
                fov_y_degrees: 90.0,
                aspect: 1.0,
                near: 0.1,
                far: 100.0,
            },
            pose: CameraPose::new(Vec3::ZERO, Vec3::NEG_Z),
        });

        let mut scene = Scene::new();
        let model = scene.add_model(SceneModel::new("box", AABB::from_size(Vec3::splat(2.0))));
        let center = Vec3::new(80.0, 80.0, -90.0);
        let target = scene.add_object(Object3D::renderable("corner", model).with_translation(center));

        // Inside the frustum (depth 90 < far) but more than `far` away along the ray.
        let ndc = camera.view_projection_matrix().project_point3(center).truncate();
        let hits = HitTester::new().pick(ndc, &camera, &scene, &[target]);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].object, target);
        assert!(hits[0].distance > 100.0);
    }

    #[test]
    fn tiny_world_scale_is_still_hit() {
        let mut scene = Scene::new();
        let model = scene.add_model(SceneModel::new("body", AABB::from_size(Vec3::splat(100.0))));
        let mut actor = Object3D::group("centimetre actor");
        actor.transform.set_scale(Vec3::splat(0.004));
        let actor = scene.add_object(actor);
        let body = scene.add_child(actor, Object3D::renderable("body", model)).unwrap();

        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let hits = HitTester::new().pick_ray(&ray, &scene, &[actor]);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].object, body);
        assert!((hits[0].distance - 9.8).abs() < 1e-3);
    }

    #[test]
    fn zero_scale_node_is_skipped() {
        let mut scene = Scene::new();
        let model = scene.add_model(SceneModel::new("box", AABB::from_size(Vec3::ONE)));
        let mut flat = Object3D::renderable("flat", model);
        flat.transform.set_scale(Vec3::ZERO);
        let flat = scene.add_object(flat);

        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        assert!(HitTester::new().pick_ray(&ray, &scene, &[flat]).is_empty());
    }

    #[test]
    fn nearest_owner_skips_unowned_hits() {
        let (mut scene, root, near, far) = overlapping_scene();
        let mut actor = Object3D::group("actor");
        actor.actor_root = true;
        let actor = scene.add_child(root, actor).unwrap();
        scene.set_object_parent(far, Some(actor)).unwrap();

        let mut tester = HitTester::new();
        let hits = tester.pick(Vec2::ZERO, &camera(), &scene, &[root]);
        assert_eq!(hits[0].object, near);

        let (owner, hit) = tester.nearest_owner(&scene, &hits).unwrap();
        assert_eq!(owner, actor);
        assert_eq!(hit.object, far);
    }
}
