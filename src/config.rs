use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::camera::CameraId;

pub const DEFAULT_CONFIG_PATH: &str = "robosandbox.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// 0xRRGGBB
    pub clear_color: u32,
    pub initial_camera: CameraId,
    /// Joint sweep per frame while a drive key is held.
    pub joint_speed_degrees: f32,
    pub actor_paths: Vec<PathBuf>,
    pub actor_count: usize,
    pub spawn_radius: f32,
    pub idle_clip: String,
    pub one_shot_clip: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            window_title: "robosandbox".into(),
            window_width: 1280,
            window_height: 720,
            clear_color: 0xcccccc,
            initial_camera: CameraId::Perspective,
            joint_speed_degrees: 1.0,
            actor_paths: vec![PathBuf::from("assets/actors/zombie.glb")],
            actor_count: 5,
            spawn_radius: 250.0,
            idle_clip: "Idle".into(),
            one_shot_clip: "Death".into(),
        }
    }
}

impl SandboxConfig {
    /// Reads the config from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn clear_color_rgba(&self) -> [f64; 4] {
        let channel = |shift: u32| ((self.clear_color >> shift) & 0xff) as f64 / 255.0;
        [channel(16), channel(8), channel(0), 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SandboxConfig::from_toml(
            r#"
            joint_speed_degrees = 2.5
            initial_camera = "Top"
            "#,
        )
        .unwrap();

        assert_eq!(config.joint_speed_degrees, 2.5);
        assert_eq!(config.initial_camera, CameraId::Top);
        assert_eq!(config.clear_color, 0xcccccc);
        assert_eq!(config.one_shot_clip, "Death");
    }

    #[test]
    fn unknown_camera_is_rejected() {
        assert!(SandboxConfig::from_toml("initial_camera = \"Fisheye\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = SandboxConfig::load(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn clear_color_splits_channels() {
        let config = SandboxConfig {
            clear_color: 0xff8000,
            ..Default::default()
        };
        let [r, g, b, a] = config.clear_color_rgba();
        assert_eq!((r, b, a), (1.0, 0.0, 1.0));
        assert!((g - 128.0 / 255.0).abs() < 1e-9);
    }
}
