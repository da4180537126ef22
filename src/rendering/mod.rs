pub mod box_pass;
pub mod camera_uniform;
pub mod renderer;
pub mod texture;
