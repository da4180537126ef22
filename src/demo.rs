use std::f32::consts::TAU;

use anyhow::Context;
use glam::Vec3;
use rand::Rng;

use crate::{
    articulated::{ArticulatedChain, JointDescriptor, JointId},
    assets::{ActorLoader, GltfSource},
    camera::{CameraConfig, CameraId, CameraPose, Projection},
    config::SandboxConfig,
    controller::{ControllerOptions, SceneController},
    error::Result,
    input::{Action, Key},
    math::bounds::AABB,
    scene_graph::{
        object3d::{Object3D, ObjectId},
        scene::Scene,
        scene_model::SceneModel,
    },
};

const ORTHO_HALF_HEIGHT: f32 = 300.0;

pub struct RobotArm {
    pub root: ObjectId,
    pub shoulder: JointId,
    pub elbow: JointId,
    pub wrist: JointId,
}

pub struct DemoState {
    pub controller: SceneController,
    pub arm: RobotArm,
}

impl DemoState {
    /// Builds the scene and starts loading actors in the background.
    pub fn new(config: &SandboxConfig) -> anyhow::Result<Self> {
        let mut demo = Self::build(config)?;

        let loader = ActorLoader::spawn(GltfSource).context("Failed to start actor loader")?;
        demo.controller.set_loader(loader);
        demo.spawn_actors(config, &mut rand::thread_rng());

        Ok(demo)
    }

    /// Cameras, static geometry, the robot arm and key bindings. No actors.
    pub fn build(config: &SandboxConfig) -> anyhow::Result<Self> {
        let mut controller = SceneController::new(ControllerOptions::from(config));

        for camera in default_cameras() {
            controller
                .cameras_mut()
                .register(camera)
                .context("Failed to register camera")?;
        }

        add_static_geometry(controller.scene_mut());

        let arm = controller
            .build_chain(build_robot_arm)
            .context("Failed to build robot arm")?;

        controller
            .bindings_mut()
            .bind(Key::Digit1, Action::SwitchCamera(CameraId::Perspective))
            .bind(Key::Digit2, Action::SwitchCamera(CameraId::Top))
            .bind(Key::Digit3, Action::SwitchCamera(CameraId::Front))
            .bind(Key::Digit4, Action::SwitchCamera(CameraId::Side));

        for (increase, decrease, joint) in [
            (Key::Q, Key::A, arm.shoulder),
            (Key::W, Key::S, arm.elbow),
            (Key::E, Key::D, arm.wrist),
        ] {
            controller
                .bindings_mut()
                .bind(
                    increase,
                    Action::DriveJoint {
                        joint,
                        direction: 1.0,
                    },
                )
                .bind(
                    decrease,
                    Action::DriveJoint {
                        joint,
                        direction: -1.0,
                    },
                );
        }

        controller
            .switch_camera(config.initial_camera)
            .context("Initial camera is not registered")?;

        Ok(Self { controller, arm })
    }

    /// Requests `actor_count` actors, scattered on a ring around the origin.
    pub fn spawn_actors(&mut self, config: &SandboxConfig, rng: &mut impl Rng) {
        if config.actor_paths.is_empty() {
            log::warn!("No actor paths configured, skipping actor spawns");
            return;
        }

        for (index, path) in config
            .actor_paths
            .iter()
            .cycle()
            .take(config.actor_count)
            .enumerate()
        {
            let angle = rng.gen_range(0.0..TAU);
            let distance = rng.gen_range(0.5..=1.0) * config.spawn_radius;
            let position = Vec3::new(angle.cos() * distance, -50.0, angle.sin() * distance);

            let key = self
                .controller
                .spawn_actor(format!("actor-{index}"), path, position);
            log::debug!("Requested {:?} at {}", key, position);
        }
    }
}

fn default_cameras() -> [CameraConfig; 4] {
    let orthographic = Projection::Orthographic {
        left: -ORTHO_HALF_HEIGHT,
        right: ORTHO_HALF_HEIGHT,
        top: ORTHO_HALF_HEIGHT,
        bottom: -ORTHO_HALF_HEIGHT,
        near: 0.1,
        far: 2000.0,
    };

    [
        CameraConfig {
            id: CameraId::Perspective,
            projection: Projection::Perspective {
                fov_y_degrees: 75.0,
                aspect: 1.0,
                near: 0.001,
                far: 1000.0,
            },
            pose: CameraPose::new(Vec3::new(0.0, 150.0, 300.0), Vec3::ZERO),
        },
        CameraConfig {
            id: CameraId::Top,
            projection: orthographic,
            pose: CameraPose::new(Vec3::new(0.0, 500.0, 0.0), Vec3::ZERO).with_up(Vec3::NEG_Z),
        },
        CameraConfig {
            id: CameraId::Front,
            projection: orthographic,
            pose: CameraPose::new(Vec3::new(0.0, 0.0, 500.0), Vec3::ZERO),
        },
        CameraConfig {
            id: CameraId::Side,
            projection: orthographic,
            pose: CameraPose::new(Vec3::new(500.0, 0.0, 0.0), Vec3::ZERO),
        },
    ]
}

fn color(rgb: u32) -> [f32; 4] {
    let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
    [channel(16), channel(8), channel(0), 1.0]
}

fn add_static_geometry(scene: &mut Scene) {
    let ground = scene.add_model(
        SceneModel::new("ground", AABB::from_size(Vec3::new(800.0, 2.0, 800.0)))
            .with_color(color(0x8a8f80)),
    );
    let cube = scene.add_model(
        SceneModel::new("cube", AABB::from_size(Vec3::splat(100.0))).with_color(color(0x2b2b2b)),
    );

    scene.add_object(
        Object3D::renderable("ground", ground).with_translation(Vec3::new(0.0, -51.0, 0.0)),
    );
    scene.add_object(Object3D::renderable("cube", cube));
}

/// Base, three joints and a limb box hanging off each joint.
fn build_robot_arm(scene: &mut Scene) -> Result<(ArticulatedChain, RobotArm)> {
    let root = scene.add_object(
        Object3D::group("robot_arm").with_translation(Vec3::new(-200.0, -50.0, 0.0)),
    );
    let mut chain = ArticulatedChain::new(root);

    limb(scene, root, "base", Vec3::new(60.0, 20.0, 60.0), 0x3d5a80)?;

    let shoulder = chain.add_joint(
        scene,
        root,
        JointDescriptor::new("shoulder", Vec3::new(0.0, 20.0, 0.0), Vec3::Z).with_limits(0.0, 90.0),
    )?;
    let shoulder_node = joint_node(&chain, shoulder);
    limb(scene, shoulder_node, "upper_arm", Vec3::new(20.0, 100.0, 20.0), 0xee6c4d)?;

    let elbow = chain.add_joint(
        scene,
        shoulder_node,
        JointDescriptor::new("elbow", Vec3::new(0.0, 100.0, 0.0), Vec3::Z).with_limits(0.0, 135.0),
    )?;
    let elbow_node = joint_node(&chain, elbow);
    limb(scene, elbow_node, "forearm", Vec3::new(16.0, 80.0, 16.0), 0x98c1d9)?;

    let wrist = chain.add_joint(
        scene,
        elbow_node,
        JointDescriptor::new("wrist", Vec3::new(0.0, 80.0, 0.0), Vec3::Y).with_limits(0.0, 180.0),
    )?;
    let wrist_node = joint_node(&chain, wrist);
    limb(scene, wrist_node, "hand", Vec3::new(30.0, 10.0, 30.0), 0x293241)?;

    let arm = RobotArm {
        root,
        shoulder,
        elbow,
        wrist,
    };

    Ok((chain, arm))
}

/// A box standing on the parent's origin.
fn limb(scene: &mut Scene, parent: ObjectId, name: &str, size: Vec3, rgb: u32) -> Result<ObjectId> {
    let model =
        scene.add_model(SceneModel::new(name, AABB::from_size(size)).with_color(color(rgb)));
    scene.add_child(
        parent,
        Object3D::renderable(name, model).with_translation(Vec3::Y * size.y * 0.5),
    )
}

fn joint_node(chain: &ArticulatedChain, id: JointId) -> ObjectId {
    chain
        .joint(id)
        .map(|joint| joint.node())
        .unwrap_or_else(|| chain.root())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::input::InputEvent;
    use crate::renderer::Renderer;

    struct CountingRenderer(usize);

    impl Renderer for CountingRenderer {
        fn render(&mut self, _scene: &Scene, _camera: &crate::camera::Camera) {
            self.0 += 1;
        }
    }

    #[test]
    fn build_registers_cameras_and_arm() {
        let demo = DemoState::build(&SandboxConfig::default()).unwrap();
        let controller = &demo.controller;

        assert_eq!(controller.cameras().len(), 4);
        assert_eq!(controller.cameras().active_id(), Some(CameraId::Perspective));

        let chain = controller.chain().unwrap();
        assert_eq!(chain.joints().count(), 3);
        assert_eq!(chain.root(), demo.arm.root);

        // ground, cube, base and one limb per joint
        assert_eq!(controller.scene().renderables().count(), 6);
    }

    #[test]
    fn initial_camera_comes_from_config() {
        let config = SandboxConfig {
            initial_camera: CameraId::Top,
            ..Default::default()
        };
        let demo = DemoState::build(&config).unwrap();
        assert_eq!(demo.controller.cameras().active_id(), Some(CameraId::Top));
    }

    #[test]
    fn digit_keys_switch_cameras() {
        let mut demo = DemoState::build(&SandboxConfig::default()).unwrap();
        let mut renderer = CountingRenderer(0);

        demo.controller.dispatch(InputEvent::KeyDown(Key::Digit3));
        demo.controller.dispatch(InputEvent::KeyUp(Key::Digit3));
        demo.controller.tick(0.016, &mut renderer);

        assert_eq!(demo.controller.cameras().active_id(), Some(CameraId::Front));
        assert_eq!(renderer.0, 1);
    }

    #[test]
    fn held_key_sweeps_shoulder() {
        let mut demo = DemoState::build(&SandboxConfig::default()).unwrap();
        let mut renderer = CountingRenderer(0);

        demo.controller.dispatch(InputEvent::KeyDown(Key::Q));
        for _ in 0..3 {
            demo.controller.tick(0.016, &mut renderer);
        }
        demo.controller.dispatch(InputEvent::KeyUp(Key::Q));
        demo.controller.tick(0.016, &mut renderer);

        let chain = demo.controller.chain().unwrap();
        let angle = chain
            .joint(demo.arm.shoulder)
            .unwrap()
            .state()
            .angle_degrees();
        assert!((angle + 3.0).abs() < 1e-4);
    }

    #[test]
    fn spawn_actors_cycles_paths_within_radius() {
        let config = SandboxConfig {
            actor_paths: vec!["a.glb".into(), "b.glb".into()],
            actor_count: 5,
            spawn_radius: 100.0,
            ..Default::default()
        };
        let mut demo = DemoState::build(&config).unwrap();
        demo.spawn_actors(&config, &mut StdRng::seed_from_u64(7));

        let pending = (0..5)
            .map(crate::controller::ActorKey::new)
            .filter(|key| demo.controller.is_pending(*key))
            .count();
        assert_eq!(pending, 5);
    }
}
