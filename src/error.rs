use std::path::PathBuf;

use thiserror::Error;

use crate::articulated::JointId;
use crate::camera::CameraId;
use crate::controller::ActorKey;
use crate::scene_graph::object3d::ObjectId;

/// Failures raised by the scene core.
///
/// Only `Load` is expected during normal operation. `ConstraintViolation` and
/// `StaleCallback` are recovered locally by the controller, the camera variants
/// indicate a programming error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("joint {joint:?} rejected move to {attempted} degrees (limits {min}..={max})")]
    ConstraintViolation {
        joint: JointId,
        attempted: f32,
        min: f32,
        max: f32,
    },

    #[error("camera {0:?} is not registered")]
    UnknownCamera(CameraId),

    #[error("camera {0:?} is already registered")]
    DuplicateId(CameraId),

    #[error("failed to load {}: {cause}", .path.display())]
    Load { path: PathBuf, cause: String },

    #[error("load completed for removed actor {0:?}")]
    StaleCallback(ActorKey),

    #[error("scene node {0:?} does not exist")]
    UnknownNode(ObjectId),

    #[error("cannot parent {child:?} under its own descendant {parent:?}")]
    CyclicParent { child: ObjectId, parent: ObjectId },

    #[error("joint {0:?} does not exist")]
    UnknownJoint(JointId),
}

impl SceneError {
    /// Errors that only happen when the calling code is wrong.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            SceneError::UnknownCamera(_)
                | SceneError::DuplicateId(_)
                | SceneError::UnknownNode(_)
                | SceneError::CyclicParent { .. }
                | SceneError::UnknownJoint(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SceneError>;
