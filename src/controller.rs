//! The scene controller: owns every piece of scene state and runs the frame tick.
//!
//! Input arrives through [`SceneController::dispatch`] at any time and is queued.
//! [`SceneController::tick`] then applies, in order: queued input and finished actor
//! loads, held-key joint driving, animation advance, and finally the render request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::animation::{AnimationClip, AnimationClipRef, AnimationTrack, LoopMode};
use crate::articulated::{ArticulatedChain, JointId};
use crate::assets::{ActorDescription, ActorLoader};
use crate::camera::{CameraId, CameraRegistry};
use crate::config::SandboxConfig;
use crate::error::{Result, SceneError};
use crate::input::{Action, HeldKeys, InputEvent, KeyBindings};
use crate::picking::HitTester;
use crate::renderer::Renderer;
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

/// Identity of a requested actor, stable from the spawn request until removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorKey(u64);

impl ActorKey {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub joint_speed_degrees: f32,
    pub idle_clip: String,
    pub one_shot_clip: String,
    /// Panic on programmer errors (unknown or duplicate camera ids, dangling handles).
    /// Only honored in debug builds.
    pub strict: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&SandboxConfig::default())
    }
}

impl From<&SandboxConfig> for ControllerOptions {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            joint_speed_degrees: config.joint_speed_degrees,
            idle_clip: config.idle_clip.clone(),
            one_shot_clip: config.one_shot_clip.clone(),
            strict: cfg!(debug_assertions),
        }
    }
}

struct PendingActor {
    name: String,
    path: PathBuf,
    position: Vec3,
}

pub struct Actor {
    pub name: String,
    pub root: ObjectId,
    pub clips: HashMap<String, AnimationClipRef>,
    pub track: Option<AnimationTrack>,
}

pub struct SceneController {
    scene: Scene,
    cameras: CameraRegistry,
    chain: Option<ArticulatedChain>,
    hit_tester: HitTester,
    bindings: KeyBindings,
    held: HeldKeys,
    queue: Vec<InputEvent>,
    options: ControllerOptions,

    loader: Option<ActorLoader>,
    next_actor_key: u64,
    pending: HashMap<ActorKey, PendingActor>,
    actors: HashMap<ActorKey, Actor>,
}

impl SceneController {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            scene: Scene::new(),
            cameras: CameraRegistry::new(),
            chain: None,
            hit_tester: HitTester::new(),
            bindings: KeyBindings::new(),
            held: HeldKeys::default(),
            queue: Vec::new(),
            options,
            loader: None,
            next_actor_key: 0,
            pending: HashMap::new(),
            actors: HashMap::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn cameras(&self) -> &CameraRegistry {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut CameraRegistry {
        &mut self.cameras
    }

    pub fn chain(&self) -> Option<&ArticulatedChain> {
        self.chain.as_ref()
    }

    /// Builds the articulated chain against this controller's scene.
    pub fn build_chain<T>(
        &mut self,
        build: impl FnOnce(&mut Scene) -> Result<(ArticulatedChain, T)>,
    ) -> Result<T> {
        let (chain, extra) = build(&mut self.scene)?;
        self.chain = Some(chain);
        Ok(extra)
    }

    pub fn bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.bindings
    }

    pub fn set_loader(&mut self, loader: ActorLoader) {
        self.loader = Some(loader);
    }

    pub fn actor(&self, key: ActorKey) -> Option<&Actor> {
        self.actors.get(&key)
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorKey, &Actor)> {
        self.actors.iter().map(|(key, actor)| (*key, actor))
    }

    /// True from the spawn request until the actor is removed.
    pub fn is_live(&self, key: ActorKey) -> bool {
        self.pending.contains_key(&key) || self.actors.contains_key(&key)
    }

    pub fn is_pending(&self, key: ActorKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Queues an input event for the next tick.
    pub fn dispatch(&mut self, event: InputEvent) {
        self.queue.push(event);
    }

    pub fn switch_camera(&mut self, id: CameraId) -> Result<()> {
        self.cameras.activate(id)?;
        log::info!("Switched to camera {:?}", id);
        Ok(())
    }

    pub fn rotate_joint(&mut self, joint: JointId, delta_degrees: f32) -> Result<f32> {
        let chain = self.chain.as_mut().ok_or(SceneError::UnknownJoint(joint))?;
        chain.rotate(&mut self.scene, joint, delta_degrees)
    }

    /// Picks at a pixel position and triggers the one-shot clip of the nearest hit
    /// actor. Returns the actor whose track changed state.
    pub fn click(&mut self, position: Vec2) -> Option<ActorKey> {
        let viewport = self.cameras.viewport()?;
        let camera = self.cameras.active()?;
        let ndc = viewport.to_ndc(position);

        let roots: Vec<ObjectId> = self.scene.roots().collect();
        let hits = self.hit_tester.pick(ndc, camera, &self.scene, &roots);
        let (owner, hit) = self.hit_tester.nearest_owner(&self.scene, &hits)?;

        let (key, actor) = self
            .actors
            .iter_mut()
            .find(|(_, actor)| actor.root == owner)?;

        log::debug!(
            "Click hit actor {} at distance {:.2}",
            actor.name,
            hit.distance
        );

        let track = actor.track.as_mut()?;
        if track.trigger() {
            log::info!("Actor {} triggered {}", actor.name, track.active_clip().name);
            Some(*key)
        } else {
            None
        }
    }

    /// Registers a live actor identity and starts loading it.
    pub fn spawn_actor(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        position: Vec3,
    ) -> ActorKey {
        let key = ActorKey(self.next_actor_key);
        self.next_actor_key += 1;

        let pending = PendingActor {
            name: name.into(),
            path: path.into(),
            position,
        };

        if let Some(loader) = &self.loader {
            loader.request(key, pending.path.clone());
        }

        self.pending.insert(key, pending);
        key
    }

    /// Removes an actor and its subtree, or forgets a load still in flight.
    pub fn remove_actor(&mut self, key: ActorKey) -> bool {
        if let Some(pending) = self.pending.remove(&key) {
            log::debug!("Cancelled pending actor {}", pending.name);
            return true;
        }

        let Some(actor) = self.actors.remove(&key) else {
            return false;
        };

        if let Err(error) = self.scene.despawn(actor.root) {
            self.report(error);
        }
        log::info!("Removed actor {}", actor.name);
        true
    }

    /// Completion callback for an actor load. Loads for identities that were removed
    /// in the meantime are discarded; failed loads leave the scene untouched.
    pub fn on_actor_loaded(
        &mut self,
        key: ActorKey,
        result: Result<ActorDescription>,
    ) -> Result<ObjectId> {
        let Some(pending) = self.pending.remove(&key) else {
            return Err(SceneError::StaleCallback(key));
        };

        let description = result?;
        let spawned = description.instantiate(&mut self.scene, &pending.name, pending.position)?;
        let track = self.create_track(&spawned.clips);

        log::info!(
            "Spawned actor {} from {} ({} clips)",
            pending.name,
            pending.path.display(),
            spawned.clips.len()
        );

        self.actors.insert(
            key,
            Actor {
                name: pending.name,
                root: spawned.root,
                clips: spawned.clips,
                track,
            },
        );

        Ok(spawned.root)
    }

    fn find_clip<'a>(
        clips: &'a HashMap<String, AnimationClipRef>,
        name: &str,
    ) -> Option<&'a AnimationClipRef> {
        clips.get(name).or_else(|| {
            clips
                .iter()
                .find(|(clip_name, _)| clip_name.eq_ignore_ascii_case(name))
                .map(|(_, clip)| clip)
        })
    }

    fn create_track(&self, clips: &HashMap<String, AnimationClipRef>) -> Option<AnimationTrack> {
        let idle = Self::find_clip(clips, &self.options.idle_clip).or_else(|| {
            // Deterministic fallback: the alphabetically first clip.
            clips
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case(&self.options.one_shot_clip))
                .min_by(|a, b| a.0.cmp(b.0))
                .map(|(_, clip)| clip)
        })?;

        let one_shot = Self::find_clip(clips, &self.options.one_shot_clip).map(|clip| {
            Arc::new(AnimationClip {
                loop_mode: LoopMode::OnceAndClamp,
                ..(**clip).clone()
            })
        });

        Some(AnimationTrack::new(idle.clone(), one_shot))
    }

    fn handle_event(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::KeyDown(key) => {
                self.held.press(key);
                if let Some(Action::SwitchCamera(id)) = self.bindings.action(key) {
                    self.switch_camera(id)?;
                }
            }
            InputEvent::KeyUp(key) => self.held.release(key),
            InputEvent::Click { x, y } => {
                self.click(Vec2::new(x, y));
            }
            InputEvent::Resize { width, height } => self.cameras.resize(width, height),
        }

        Ok(())
    }

    fn drive_held_joints(&mut self) {
        let drives: Vec<(JointId, f32)> = self
            .held
            .iter()
            .filter_map(|key| match self.bindings.action(key) {
                Some(Action::DriveJoint { joint, direction }) => {
                    Some((joint, direction * self.options.joint_speed_degrees))
                }
                _ => None,
            })
            .collect();

        for (joint, delta) in drives {
            if let Err(error) = self.rotate_joint(joint, delta) {
                self.report(error);
            }
        }
    }

    fn drain_loader(&mut self) {
        let completions = match &self.loader {
            Some(loader) => loader.drain(),
            None => return,
        };

        for (key, result) in completions {
            if let Err(error) = self.on_actor_loaded(key, result) {
                self.report(error);
            }
        }
    }

    fn advance_animations(&mut self, dt_seconds: f32) {
        for actor in self.actors.values_mut() {
            let Some(track) = actor.track.as_mut() else {
                continue;
            };

            track.advance(dt_seconds);
            if let Err(error) = track.apply(&mut self.scene) {
                log::warn!("Failed to pose actor {}: {}", actor.name, error);
            }
        }
    }

    /// One frame. Never fails: every error is logged and the remaining phases still
    /// run, including the render request.
    pub fn tick(&mut self, dt_seconds: f32, renderer: &mut dyn Renderer) {
        for event in std::mem::take(&mut self.queue) {
            if let Err(error) = self.handle_event(event) {
                self.report(error);
            }
        }
        self.drain_loader();
        self.drive_held_joints();

        self.advance_animations(dt_seconds);

        self.scene.late_update();
        match self.cameras.active() {
            Some(camera) => renderer.render(&self.scene, camera),
            None => log::trace!("No active camera, skipping render"),
        }
    }

    fn report(&self, error: SceneError) {
        match &error {
            SceneError::ConstraintViolation { .. } => log::trace!("{}", error),
            SceneError::StaleCallback(_) => log::debug!("Discarded: {}", error),
            SceneError::Load { .. } => log::warn!("{}", error),
            _ => {
                log::error!("{}", error);
                debug_assert!(
                    !(self.options.strict && error.is_programmer_error()),
                    "{error}"
                );
            }
        }
    }
}
