use crate::camera::Camera;
use crate::scene_graph::scene::Scene;

/// Draws the scene. World matrices are refreshed before every call.
pub trait Renderer {
    fn render(&mut self, scene: &Scene, camera: &Camera);
}
