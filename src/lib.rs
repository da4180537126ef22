pub mod animation;
pub mod articulated;
pub mod assets;
pub mod camera;
pub mod config;
pub mod controller;
pub mod demo;
pub mod error;
pub mod input;
pub mod math;
pub mod picking;
pub mod renderer;
pub mod rendering;
pub mod scene_graph;
pub mod window;
