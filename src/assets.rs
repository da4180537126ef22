//! Actor loading.
//!
//! Sources turn a path into an [`ActorDescription`], a plain tree of nodes and clips
//! with no scene ids in it. [`ActorLoader`] runs a source on a worker thread and hands
//! finished loads back through a channel; the controller decides whether the result
//! is still wanted before instantiating it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use glam::{Quat, Vec3};

use crate::animation::{
    AnimationClip, AnimationClipRef, Channel, Interpolation, KeyframeValues, Keyframes, LoopMode,
};
use crate::controller::ActorKey;
use crate::error::{Result, SceneError};
use crate::math::bounds::AABB;
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene::Scene;
use crate::scene_graph::scene_model::SceneModel;
use crate::scene_graph::transform::Transform;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescription {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Local bounds of the node's mesh; `None` for pure groups.
    pub bounds: Option<AABB>,
    pub children: Vec<usize>,
}

impl NodeDescription {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            bounds: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDescription {
    pub node: usize,
    pub keyframes: Keyframes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipDescription {
    pub name: String,
    pub duration_seconds: f32,
    pub channels: Vec<ChannelDescription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorDescription {
    pub source: PathBuf,
    pub nodes: Vec<NodeDescription>,
    pub roots: Vec<usize>,
    pub clips: Vec<ClipDescription>,
}

/// An actor that has been inserted into a scene.
#[derive(Debug, Clone)]
pub struct SpawnedActor {
    pub root: ObjectId,
    pub clips: HashMap<String, AnimationClipRef>,
}

fn load_error(path: &Path, cause: impl ToString) -> SceneError {
    SceneError::Load {
        path: path.to_path_buf(),
        cause: cause.to_string(),
    }
}

impl ActorDescription {
    /// Checks that child and channel indices are in range and that every node is
    /// reachable from the roots exactly once.
    pub fn validate(&self) -> Result<()> {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = self.roots.clone();

        while let Some(index) = stack.pop() {
            let node = self
                .nodes
                .get(index)
                .ok_or_else(|| load_error(&self.source, format!("node {index} out of range")))?;

            if std::mem::replace(&mut visited[index], true) {
                return Err(load_error(
                    &self.source,
                    format!("node {index} is reachable more than once"),
                ));
            }

            stack.extend(node.children.iter().copied());
        }

        for clip in &self.clips {
            if let Some(channel) = clip.channels.iter().find(|c| c.node >= self.nodes.len()) {
                return Err(load_error(
                    &self.source,
                    format!("clip {} targets missing node {}", clip.name, channel.node),
                ));
            }
        }

        Ok(())
    }

    /// Inserts the actor as a new root tagged as an actor, placed at `position`.
    /// Nothing is inserted when validation fails.
    pub fn instantiate(
        &self,
        scene: &mut Scene,
        name: &str,
        position: Vec3,
    ) -> Result<SpawnedActor> {
        self.validate()?;

        let mut actor = Object3D::group(name).with_translation(position);
        actor.actor_root = true;
        let root = scene.add_object(actor);

        let mut object_ids: Vec<Option<ObjectId>> = vec![None; self.nodes.len()];
        let mut stack: Vec<(usize, ObjectId)> =
            self.roots.iter().rev().map(|&index| (index, root)).collect();

        while let Some((index, parent)) = stack.pop() {
            let node = &self.nodes[index];
            let transform = Transform::new(node.translation, node.rotation, node.scale);

            let object = match node.bounds {
                Some(bounds) => {
                    let model = scene.add_model(SceneModel::new(node.name.clone(), bounds));
                    Object3D::renderable(node.name.clone(), model)
                }
                None => Object3D::group(node.name.clone()),
            }
            .with_transform(transform);

            let object_id = scene.add_child(parent, object)?;
            object_ids[index] = Some(object_id);

            stack.extend(node.children.iter().rev().map(|&child| (child, object_id)));
        }

        let clips = self
            .clips
            .iter()
            .map(|clip| {
                let channels = clip
                    .channels
                    .iter()
                    .filter_map(|channel| {
                        Some(Channel {
                            target: object_ids[channel.node]?,
                            keyframes: channel.keyframes.clone(),
                        })
                    })
                    .collect();

                let clip_ref = Arc::new(
                    AnimationClip::new(clip.name.clone(), clip.duration_seconds, LoopMode::Loop)
                        .with_channels(channels),
                );
                (clip.name.clone(), clip_ref)
            })
            .collect();

        Ok(SpawnedActor { root, clips })
    }
}

pub trait AssetSource: Send + 'static {
    fn load(&self, path: &Path) -> Result<ActorDescription>;
}

/// Reads actors from glTF / GLB files.
pub struct GltfSource;

impl AssetSource for GltfSource {
    fn load(&self, path: &Path) -> Result<ActorDescription> {
        let (document, buffers, _images) =
            gltf::import(path).map_err(|error| load_error(path, error))?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| load_error(path, "no scenes in gltf"))?;

        let nodes = document
            .nodes()
            .map(|node| {
                let (translation, rotation, scale) = node.transform().decomposed();

                let bounds = node.mesh().and_then(|mesh| {
                    mesh.primitives()
                        .map(|primitive| {
                            let bounds = primitive.bounding_box();
                            AABB::new(Vec3::from(bounds.min), Vec3::from(bounds.max))
                        })
                        .reduce(|a, b| a.union(&b))
                });

                NodeDescription {
                    name: node.name().unwrap_or("Unnamed").to_string(),
                    translation: translation.into(),
                    rotation: Quat::from_array(rotation),
                    scale: scale.into(),
                    bounds,
                    children: node.children().map(|child| child.index()).collect(),
                }
            })
            .collect();

        let roots = scene.nodes().map(|node| node.index()).collect();

        let clips = document
            .animations()
            .enumerate()
            .map(|(index, animation)| {
                let channels: Vec<ChannelDescription> = animation
                    .channels()
                    .filter_map(|channel| read_channel(&channel, &buffers))
                    .collect();

                let duration_seconds = channels
                    .iter()
                    .map(|channel| channel.keyframes.last_time())
                    .fold(0.0, f32::max);

                ClipDescription {
                    name: animation
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("Animation {index}")),
                    duration_seconds,
                    channels,
                }
            })
            .collect();

        Ok(ActorDescription {
            source: path.to_path_buf(),
            nodes,
            roots,
            clips,
        })
    }
}

fn read_channel(
    channel: &gltf::animation::Channel,
    buffers: &[gltf::buffer::Data],
) -> Option<ChannelDescription> {
    use gltf::animation::util::ReadOutputs;

    let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
    let times: Vec<f32> = reader.read_inputs()?.collect();

    let (interpolation, cubic) = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::Step => (Interpolation::Step, false),
        gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
        // Keep only the value of each (in-tangent, value, out-tangent) triple.
        gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
    };

    fn keep<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
        if cubic {
            values.skip(1).step_by(3).collect()
        } else {
            values.collect()
        }
    }

    let values = match reader.read_outputs()? {
        ReadOutputs::Translations(values) => {
            KeyframeValues::Translations(keep(values.map(Vec3::from), cubic))
        }
        ReadOutputs::Rotations(values) => {
            KeyframeValues::Rotations(keep(values.into_f32().map(Quat::from_array), cubic))
        }
        ReadOutputs::Scales(values) => KeyframeValues::Scales(keep(values.map(Vec3::from), cubic)),
        ReadOutputs::MorphTargetWeights(_) => return None,
    };

    Some(ChannelDescription {
        node: channel.target().node().index(),
        keyframes: Keyframes {
            times,
            values,
            interpolation,
        },
    })
}

pub type LoadCompletion = (ActorKey, Result<ActorDescription>);

/// Loads actors on a background thread.
pub struct ActorLoader {
    requests: Sender<(ActorKey, PathBuf)>,
    completions: Receiver<LoadCompletion>,
    _worker: JoinHandle<()>,
}

impl ActorLoader {
    pub fn spawn<S: AssetSource>(source: S) -> anyhow::Result<Self> {
        let (send_request, recv_request) = channel::<(ActorKey, PathBuf)>();
        let (send_completion, recv_completion) = channel();

        let worker = std::thread::Builder::new()
            .name("actor-loader".into())
            .spawn(move || {
                while let Ok((key, path)) = recv_request.recv() {
                    log::debug!("Loading actor {:?} from {}", key, path.display());
                    let result = source.load(&path);
                    if send_completion.send((key, result)).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn actor loader thread")?;

        Ok(Self {
            requests: send_request,
            completions: recv_completion,
            _worker: worker,
        })
    }

    pub fn request(&self, key: ActorKey, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.requests.send((key, path.clone())).is_err() {
            log::error!(
                "Actor loader thread is gone, dropping request for {}",
                path.display()
            );
        }
    }

    /// Completed loads since the last call, without blocking.
    pub fn drain(&self) -> Vec<LoadCompletion> {
        self.completions.try_iter().collect()
    }

    #[cfg(test)]
    pub(crate) fn recv_timeout(&self, timeout: std::time::Duration) -> Option<LoadCompletion> {
        use std::sync::mpsc::RecvTimeoutError;

        match self.completions.recv_timeout(timeout) {
            Ok(completion) => Some(completion),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::*;

    pub(crate) fn two_part_actor() -> ActorDescription {
        let mut body = NodeDescription::group("body");
        body.children = vec![1];
        let mut head = NodeDescription::group("head");
        head.translation = Vec3::Y;
        head.bounds = Some(AABB::from_size(Vec3::ONE));

        ActorDescription {
            source: PathBuf::from("zombie.glb"),
            nodes: vec![body, head],
            roots: vec![0],
            clips: vec![ClipDescription {
                name: "Idle".into(),
                duration_seconds: 1.0,
                channels: vec![ChannelDescription {
                    node: 1,
                    keyframes: Keyframes {
                        times: vec![0.0, 1.0],
                        values: KeyframeValues::Scales(vec![Vec3::ONE, Vec3::splat(2.0)]),
                        interpolation: Interpolation::Linear,
                    },
                }],
            }],
        }
    }

    #[test]
    fn instantiate_builds_tagged_subtree() {
        let mut scene = Scene::new();
        let spawned = two_part_actor()
            .instantiate(&mut scene, "zombie 1", Vec3::new(3.0, 0.0, 0.0))
            .unwrap();

        let root = scene.get_object(spawned.root).unwrap();
        assert!(root.actor_root);
        assert_eq!(scene.descendants(spawned.root).count(), 3);

        let (head, _, _) = scene.renderables().next().unwrap();
        assert_eq!(scene.logical_owner(head), Some(spawned.root));
        let position = scene.world_matrix(head).unwrap().transform_point3(Vec3::ZERO);
        assert!((position - Vec3::new(3.0, 1.0, 0.0)).length() < 1e-6);

        let idle = &spawned.clips["Idle"];
        assert_eq!(idle.channels[0].target, head);
    }

    #[test]
    fn invalid_description_inserts_nothing() {
        let mut scene = Scene::new();
        let mut description = two_part_actor();
        description.nodes[1].children = vec![0];

        let result = description.instantiate(&mut scene, "broken", Vec3::ZERO);
        assert!(matches!(result, Err(SceneError::Load { .. })));
        assert_eq!(scene.object_count(), 0);
    }

    #[test]
    fn out_of_range_clip_target_is_rejected() {
        let mut description = two_part_actor();
        description.clips[0].channels[0].node = 9;
        assert!(description.validate().is_err());
    }

    struct FakeSource;

    impl AssetSource for FakeSource {
        fn load(&self, path: &Path) -> Result<ActorDescription> {
            if path.ends_with("missing.glb") {
                Err(load_error(path, "not found"))
            } else {
                Ok(two_part_actor())
            }
        }
    }

    #[test]
    fn loader_reports_completions_in_order() {
        let loader = ActorLoader::spawn(FakeSource).unwrap();
        loader.request(ActorKey::new(1), "zombie.glb");
        loader.request(ActorKey::new(2), "missing.glb");

        let timeout = Duration::from_secs(5);
        let (first, first_result) = loader.recv_timeout(timeout).unwrap();
        let (second, second_result) = loader.recv_timeout(timeout).unwrap();

        assert_eq!(first, ActorKey::new(1));
        assert!(first_result.is_ok());
        assert_eq!(second, ActorKey::new(2));
        assert!(matches!(second_result, Err(SceneError::Load { .. })));
        assert!(loader.drain().is_empty());
    }

    #[test]
    fn gltf_source_reports_missing_file_as_load_error() {
        let result = GltfSource.load(Path::new("does/not/exist.gltf"));
        assert!(matches!(result, Err(SceneError::Load { .. })));
    }
}
