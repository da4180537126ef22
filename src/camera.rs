use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};
use serde::Deserialize;

use crate::error::{Result, SceneError};
use crate::math::ray::Ray;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum CameraId {
    Top,
    Front,
    Side,
    Perspective,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    /// Rebuilds the projection for a new aspect ratio. Orthographic volumes keep their
    /// vertical extent and horizontal center.
    pub fn with_aspect(self, aspect: f32) -> Projection {
        match self {
            Projection::Perspective {
                fov_y_degrees,
                near,
                far,
                ..
            } => Projection::Perspective {
                fov_y_degrees,
                aspect,
                near,
                far,
            },
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => {
                let center_x = (left + right) * 0.5;
                let half_width = (top - bottom) * 0.5 * aspect;
                Projection::Orthographic {
                    left: center_x - half_width,
                    right: center_x + half_width,
                    top,
                    bottom,
                    near,
                    far,
                }
            }
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y_degrees,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl CameraPose {
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
        }
    }

    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }
}

/// Startup description of a camera. Never mutated after registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub id: CameraId,
    pub projection: Projection,
    pub pose: CameraPose,
}

/// Live camera state: the configured projection with the current aspect applied,
/// and a pose that other systems are free to move around.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    config: CameraConfig,
    pub projection: Projection,
    pub pose: CameraPose,
}

impl Camera {
    pub fn from_config(config: CameraConfig) -> Self {
        Self {
            config,
            projection: config.projection,
            pose: config.pose,
        }
    }

    pub fn id(&self) -> CameraId {
        self.config.id
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.pose = pose;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.projection = self.projection.with_aspect(aspect);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.pose.eye, self.pose.target, self.pose.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space pick ray through a pointer position in normalized device coordinates
    /// (x right, y up, both in `[-1, 1]`).
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection_matrix().inverse();
        let unproject = |depth: f32| {
            let point = inverse * ndc.extend(depth).extend(1.0);
            point.xyz() / point.w
        };

        let near_point = unproject(0.0);

        match self.projection {
            Projection::Perspective { .. } => Ray::new(self.pose.eye, near_point - self.pose.eye),
            Projection::Orthographic { .. } => {
                let far_point = unproject(1.0);
                Ray::new(near_point, far_point - near_point)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel coordinates (origin top-left) to normalized device coordinates.
    pub fn to_ndc(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            position.x / self.width as f32 * 2.0 - 1.0,
            1.0 - position.y / self.height as f32 * 2.0,
        )
    }
}

/// Named cameras with a single active one.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    cameras: HashMap<CameraId, Camera>,
    active: Option<CameraId>,
    viewport: Option<Viewport>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, config: CameraConfig) -> Result<()> {
        if self.cameras.contains_key(&config.id) {
            return Err(SceneError::DuplicateId(config.id));
        }

        self.cameras.insert(config.id, Camera::from_config(config));
        Ok(())
    }

    /// Makes `id` the active camera, snapping it back to its configured pose and
    /// fitting its projection to the current viewport.
    pub fn activate(&mut self, id: CameraId) -> Result<()> {
        let viewport = self.viewport;
        let camera = self
            .cameras
            .get_mut(&id)
            .ok_or(SceneError::UnknownCamera(id))?;

        camera.pose = camera.config.pose;
        camera.projection = camera.config.projection;
        if let Some(viewport) = viewport {
            camera.set_aspect(viewport.aspect());
        }

        self.active = Some(id);
        Ok(())
    }

    /// Records the viewport and refits the active camera, if any. Empty viewports
    /// (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        if viewport.is_empty() {
            return;
        }

        self.viewport = Some(viewport);
        if let Some(camera) = self.active.and_then(|id| self.cameras.get_mut(&id)) {
            camera.set_aspect(viewport.aspect());
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn active_id(&self) -> Option<CameraId> {
        self.active
    }

    pub fn active(&self) -> Option<&Camera> {
        self.active.and_then(|id| self.cameras.get(&id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Camera> {
        self.active.and_then(|id| self.cameras.get_mut(&id))
    }

    pub fn get(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(&id)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
