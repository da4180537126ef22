use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::error::Result;
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Loop,
    /// Play once and hold the final pose.
    OnceAndClamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyframeValues {
    Translations(Vec<Vec3>),
    Rotations(Vec<Quat>),
    Scales(Vec<Vec3>),
}

impl KeyframeValues {
    pub fn len(&self) -> usize {
        match self {
            KeyframeValues::Translations(values) => values.len(),
            KeyframeValues::Rotations(values) => values.len(),
            KeyframeValues::Scales(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampledValue {
    Translation(Vec3),
    Rotation(Quat),
    Scale(Vec3),
}

/// Time-sorted samples for one transform property.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes {
    pub times: Vec<f32>,
    pub values: KeyframeValues,
    pub interpolation: Interpolation,
}

impl Keyframes {
    pub fn last_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, time: f32) -> Option<SampledValue> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }

        let next = self.times[..count].partition_point(|&t| t <= time);
        let (from, to, factor) = if next == 0 {
            (0, 0, 0.0)
        } else if next >= count {
            (count - 1, count - 1, 0.0)
        } else {
            let from = next - 1;
            let span = self.times[next] - self.times[from];
            let factor = match self.interpolation {
                Interpolation::Step => 0.0,
                Interpolation::Linear if span > 0.0 => (time - self.times[from]) / span,
                Interpolation::Linear => 0.0,
            };
            (from, next, factor)
        };

        Some(match &self.values {
            KeyframeValues::Translations(values) => {
                SampledValue::Translation(values[from].lerp(values[to], factor))
            }
            KeyframeValues::Rotations(values) => {
                SampledValue::Rotation(values[from].slerp(values[to], factor))
            }
            KeyframeValues::Scales(values) => {
                SampledValue::Scale(values[from].lerp(values[to], factor))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub target: ObjectId,
    pub keyframes: Keyframes,
}

/// A loaded clip. Shared read-only between the actor and its track.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration_seconds: f32,
    pub loop_mode: LoopMode,
    pub channels: Vec<Channel>,
}

pub type AnimationClipRef = Arc<AnimationClip>;

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration_seconds: f32, loop_mode: LoopMode) -> Self {
        Self {
            name: name.into(),
            duration_seconds: duration_seconds.max(0.0),
            loop_mode,
            channels: Vec::new(),
        }
    }

    pub fn with_channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    /// Writes the pose at `time` to every targeted node that still exists.
    pub fn apply(&self, scene: &mut Scene, time: f32) -> Result<()> {
        for channel in &self.channels {
            if !scene.is_alive(channel.target) {
                continue;
            }

            match channel.keyframes.sample(time) {
                Some(SampledValue::Translation(value)) => {
                    scene.set_object_translation(channel.target, value)?
                }
                Some(SampledValue::Rotation(value)) => {
                    scene.set_object_rotation(channel.target, value)?
                }
                Some(SampledValue::Scale(value)) => scene.set_object_scale(channel.target, value)?,
                None => {}
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    IdleLoop,
    TriggeredOneShot,
}

/// Per-actor playback state.
///
/// Starts in `IdleLoop`. A single external trigger switches to the one-shot clip,
/// which then plays to its end and freezes there for good.
#[derive(Debug, Clone)]
pub struct AnimationTrack {
    idle_clip: AnimationClipRef,
    one_shot_clip: Option<AnimationClipRef>,
    active_clip: AnimationClipRef,
    elapsed_seconds: f32,
    is_playing: bool,
    state: TrackState,
}

impl AnimationTrack {
    pub fn new(idle_clip: AnimationClipRef, one_shot_clip: Option<AnimationClipRef>) -> Self {
        Self {
            active_clip: idle_clip.clone(),
            idle_clip,
            one_shot_clip,
            elapsed_seconds: 0.0,
            is_playing: true,
            state: TrackState::IdleLoop,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn active_clip(&self) -> &AnimationClipRef {
        &self.active_clip
    }

    pub fn idle_clip(&self) -> &AnimationClipRef {
        &self.idle_clip
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Switches to the one-shot clip. Returns `false` (and changes nothing) when the
    /// track has already been triggered or has no one-shot clip.
    pub fn trigger(&mut self) -> bool {
        if self.state != TrackState::IdleLoop {
            return false;
        }

        let Some(one_shot) = self.one_shot_clip.clone() else {
            return false;
        };

        self.active_clip = one_shot;
        self.elapsed_seconds = 0.0;
        self.is_playing = true;
        self.state = TrackState::TriggeredOneShot;
        true
    }

    pub fn advance(&mut self, dt_seconds: f32) {
        if !self.is_playing || !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return;
        }

        let duration = self.active_clip.duration_seconds;
        self.elapsed_seconds += dt_seconds;

        match self.state {
            TrackState::IdleLoop => {
                if duration <= 0.0 {
                    self.elapsed_seconds = 0.0;
                } else if self.elapsed_seconds >= duration {
                    self.elapsed_seconds %= duration;
                }
            }
            TrackState::TriggeredOneShot => {
                if self.elapsed_seconds >= duration {
                    self.elapsed_seconds = duration;
                    self.is_playing = false;
                }
            }
        }
    }

    pub fn apply(&self, scene: &mut Scene) -> Result<()> {
        self.active_clip.apply(scene, self.elapsed_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::object3d::Object3D;

    fn track() -> AnimationTrack {
        AnimationTrack::new(
            Arc::new(AnimationClip::new("idle", 2.0, LoopMode::Loop)),
            Some(Arc::new(AnimationClip::new("die", 1.5, LoopMode::OnceAndClamp))),
        )
    }

    #[test]
    fn idle_loop_wraps_around() {
        let mut track = track();
        track.advance(1.5);
        track.advance(1.0);

        assert_eq!(track.state(), TrackState::IdleLoop);
        assert!((track.elapsed_seconds() - 0.5).abs() < 1e-6);
        assert!(track.is_playing());
    }

    #[test]
    fn second_trigger_is_ignored() {
        let mut track = track();
        track.advance(0.7);

        assert!(track.trigger());
        assert_eq!(track.elapsed_seconds(), 0.0);
        track.advance(0.4);

        assert!(!track.trigger());
        assert_eq!(track.state(), TrackState::TriggeredOneShot);
        assert_eq!(track.active_clip().name, "die");
        assert!((track.elapsed_seconds() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn one_shot_clamps_at_duration_forever() {
        let mut track = track();
        track.trigger();

        for _ in 0..100 {
            track.advance(0.1);
        }

        assert_eq!(track.elapsed_seconds(), 1.5);
        assert!(!track.is_playing());
        track.advance(10.0);
        assert_eq!(track.elapsed_seconds(), 1.5);
        assert_eq!(track.state(), TrackState::TriggeredOneShot);
    }

    #[test]
    fn trigger_without_one_shot_clip_does_nothing() {
        let mut track = AnimationTrack::new(
            Arc::new(AnimationClip::new("idle", 1.0, LoopMode::Loop)),
            None,
        );
        assert!(!track.trigger());
        assert_eq!(track.state(), TrackState::IdleLoop);
    }

    #[test]
    fn linear_keyframes_interpolate_and_clamp() {
        let keyframes = Keyframes {
            times: vec![0.0, 1.0],
            values: KeyframeValues::Translations(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]),
            interpolation: Interpolation::Linear,
        };

        assert_eq!(
            keyframes.sample(0.5),
            Some(SampledValue::Translation(Vec3::new(1.0, 0.0, 0.0)))
        );
        assert_eq!(
            keyframes.sample(7.0),
            Some(SampledValue::Translation(Vec3::new(2.0, 0.0, 0.0)))
        );
        assert_eq!(
            keyframes.sample(-1.0),
            Some(SampledValue::Translation(Vec3::ZERO))
        );
    }

    #[test]
    fn step_keyframes_hold_previous_value() {
        let keyframes = Keyframes {
            times: vec![0.0, 1.0],
            values: KeyframeValues::Scales(vec![Vec3::ONE, Vec3::splat(3.0)]),
            interpolation: Interpolation::Step,
        };

        assert_eq!(keyframes.sample(0.99), Some(SampledValue::Scale(Vec3::ONE)));
        assert_eq!(keyframes.sample(1.0), Some(SampledValue::Scale(Vec3::splat(3.0))));
    }

    #[test]
    fn clip_apply_moves_target_node() {
        let mut scene = Scene::new();
        let node = scene.add_object(Object3D::group("hips"));
        let clip = AnimationClip::new("walk", 1.0, LoopMode::Loop).with_channels(vec![Channel {
            target: node,
            keyframes: Keyframes {
                times: vec![0.0, 1.0],
                values: KeyframeValues::Translations(vec![Vec3::ZERO, Vec3::Y]),
                interpolation: Interpolation::Linear,
            },
        }]);

        clip.apply(&mut scene, 0.25).unwrap();
        let translation = scene.get_object_transform(node).unwrap().translation();
        assert!((translation - Vec3::Y * 0.25).length() < 1e-6);
    }
}
