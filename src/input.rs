use std::collections::HashMap;

use crate::articulated::JointId;
use crate::camera::CameraId;

/// Host-independent key identifiers for the keys the sandbox reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Q,
    A,
    W,
    S,
    E,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// Pointer click in window pixels, origin top-left.
    Click { x: f32, y: f32 },
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    SwitchCamera(CameraId),
    /// Sweep a joint while the key is held. `direction` scales the per-frame speed.
    DriveJoint { joint: JointId, direction: f32 },
}

#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    bindings: HashMap<Key, Action>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, key: Key, action: Action) -> &mut Self {
        if let Some(previous) = self.bindings.insert(key, action) {
            log::warn!("Key {:?} rebound from {:?} to {:?}", key, previous, action);
        }
        self
    }

    pub fn action(&self, key: Key) -> Option<Action> {
        self.bindings.get(&key).copied()
    }
}

/// Keys currently held down, in press order.
#[derive(Debug, Clone, Default)]
pub struct HeldKeys {
    keys: Vec<Key>,
}

impl HeldKeys {
    pub fn press(&mut self, key: Key) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn release(&mut self, key: Key) {
        self.keys.retain(|&held| held != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        self.keys.iter().copied()
    }
}
