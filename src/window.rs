use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    config::SandboxConfig,
    demo::DemoState,
    input::{InputEvent, Key},
    rendering::renderer::WgpuRenderer,
};

struct App {
    config: SandboxConfig,
    renderer: Option<WgpuRenderer>,
    demo_state: DemoState,
    mouse_pos: Vec2,
    last_frame: Instant,
}

impl App {
    fn new(config: SandboxConfig, demo_state: DemoState) -> Self {
        Self {
            config,
            renderer: None,
            demo_state,
            mouse_pos: Vec2::ZERO,
            last_frame: Instant::now(),
        }
    }

    fn create_renderer(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<WgpuRenderer> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;

        pollster::block_on(WgpuRenderer::new(
            Arc::new(window),
            self.config.clear_color_rgba(),
        ))
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(size);
        }
        self.demo_state.controller.dispatch(InputEvent::Resize {
            width: size.width,
            height: size.height,
        });
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame);
        self.last_frame = now;

        self.demo_state
            .controller
            .tick(delta_time.as_secs_f32(), renderer);

        match renderer.take_surface_error() {
            None => {}
            Some(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(renderer.size);
            }
            Some(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                event_loop.exit();
                return;
            }
            Some(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Some(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }

        renderer.window.request_redraw();
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyD => Key::D,
        _ => return None,
    };
    Some(key)
}

/// Translates a key event, dropping OS auto-repeat so held keys are tracked by
/// press and release only.
fn key_event_to_input(event: &KeyEvent) -> Option<InputEvent> {
    if event.repeat {
        return None;
    }

    let PhysicalKey::Code(code) = event.physical_key else {
        return None;
    };
    let key = map_key(code)?;

    Some(match event.state {
        ElementState::Pressed => InputEvent::KeyDown(key),
        ElementState::Released => InputEvent::KeyUp(key),
    })
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        match self.create_renderer(event_loop) {
            Ok(renderer) => {
                let size = renderer.size;
                renderer.window.request_redraw();
                self.renderer = Some(renderer);
                self.handle_resize(size);
                self.last_frame = Instant::now();
            }
            Err(error) => {
                log::error!("Failed to initialize renderer: {:#}", error);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(input) = key_event_to_input(&event) {
                    self.demo_state.controller.dispatch(input);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.demo_state.controller.dispatch(InputEvent::Click {
                    x: self.mouse_pos.x,
                    y: self.mouse_pos.y,
                });
            }
            _ => (),
        }
    }
}

pub fn run(config: SandboxConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let demo_state = DemoState::new(&config).context("Failed to create demo state")?;
    let mut app = App::new(config, demo_state);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_bound_keys_only() {
        assert_eq!(map_key(KeyCode::Digit2), Some(Key::Digit2));
        assert_eq!(map_key(KeyCode::KeyE), Some(Key::E));
        assert_eq!(map_key(KeyCode::KeyZ), None);
        assert_eq!(map_key(KeyCode::ArrowUp), None);
    }
}
