use glam::{Mat4, Vec3};

use crate::math::ray::Ray;

const PARALLEL_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn new(point1: Vec3, point2: Vec3) -> AABB {
        let min = point1.min(point2);
        let max = point1.max(point2);
        AABB { min, max }
    }

    /// Box of the given full size centered on the origin.
    pub fn from_size(size: Vec3) -> AABB {
        AABB::new(-size * 0.5, size * 0.5)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Maps the unit cube `[-0.5, 0.5]^3` onto this box.
    pub fn unit_cube_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.size(), glam::Quat::IDENTITY, self.center())
    }

    /// Slab test. Returns the ray parameter of the first boundary crossing in front of
    /// the origin, or the exit crossing when the origin is inside the box.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (min, max) = (self.min[axis], self.max[axis]);

            if direction.abs() < PARALLEL_EPSILON {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / direction;
            let mut t0 = (min - origin) * inv;
            let mut t1 = (max - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_near = t_near.max(t0);
            t_far = t_far.min(t1);

            if t_near > t_far {
                return None;
            }
        }

        if t_far < 0.0 {
            None
        } else if t_near >= 0.0 {
            Some(t_near)
        } else {
            Some(t_far)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_front_face() {
        let aabb = AABB::from_size(Vec3::splat(2.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        assert_eq!(aabb.intersect_ray(&ray), Some(9.0));
    }

    #[test]
    fn ray_behind_origin_misses() {
        let aabb = AABB::from_size(Vec3::splat(2.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::Z);
        assert_eq!(aabb.intersect_ray(&ray), None);
    }

    #[test]
    fn axis_parallel_ray_outside_slab_misses() {
        let aabb = AABB::from_size(Vec3::splat(2.0));
        let ray = Ray::new(Vec3::new(5.0, 0.0, 10.0), Vec3::NEG_Z);
        assert_eq!(aabb.intersect_ray(&ray), None);
    }

    #[test]
    fn origin_inside_reports_exit() {
        let aabb = AABB::from_size(Vec3::splat(2.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(aabb.intersect_ray(&ray), Some(1.0));
    }
}
