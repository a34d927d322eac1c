//! The desktop application shell: window, event loop, and render loop.

pub mod input;
pub mod picking;

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use pollster::FutureExt;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowId};

use voluscope_render::{HudRenderData, RenderEngine, RenderError};

use crate::runtime::ViewerRuntime;
use input::InputState;

/// Seconds per playback timepoint while playing.
const PLAYBACK_STEP_SECONDS: f32 = 0.1;

/// The windowed viewer application.
pub struct App {
    runtime: ViewerRuntime,
    window: Option<Arc<Window>>,
    engine: Option<RenderEngine>,
    hud: Option<HudRenderData>,
    input: InputState,
    last_frame: Option<Instant>,
    playback_accumulator: f32,
    close_requested: bool,
}

impl App {
    #[must_use]
    pub fn new(runtime: ViewerRuntime) -> Self {
        Self {
            runtime,
            window: None,
            engine: None,
            hud: None,
            input: InputState::new(),
            last_frame: None,
            playback_accumulator: 0.0,
            close_requested: false,
        }
    }

    fn render_frame(&mut self) {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame = Some(now);

        let (Some(engine), Some(hud)) = (self.engine.as_mut(), self.hud.as_mut()) else {
            return;
        };

        self.input.fly_tick(&self.runtime, engine, dt);

        if self.runtime.is_playing() {
            self.playback_accumulator += dt;
            while self.playback_accumulator >= PLAYBACK_STEP_SECONDS {
                self.playback_accumulator -= PLAYBACK_STEP_SECONDS;
                self.runtime.tick_playback();
            }
        } else {
            self.playback_accumulator = 0.0;
        }

        match self.runtime.frame(engine, Some(hud), dt) {
            Ok(()) => {}
            Err(RenderError::SurfaceLost | RenderError::SurfaceOutdated) => {
                let (w, h) = (engine.width, engine.height);
                self.runtime.resize(engine, w, h);
            }
            Err(e) => log::error!("frame failed: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("voluscope")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .expect("failed to create window"),
        );

        let engine = RenderEngine::new_windowed(window.clone())
            .block_on()
            .expect("failed to create render engine");

        let hud = HudRenderData::new(
            &engine.device,
            &engine.hud_bind_group_layout,
            &engine.hud_label_bind_group_layout,
            &engine.camera_buffer,
            &engine.colormap_sampler,
        );

        self.window = Some(window);
        self.engine = Some(engine);
        self.hud = Some(hud);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = &mut self.engine {
                    self.runtime.resize(engine, size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render_frame();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.input.shift_down = modifiers.state().shift_key();
                self.input.ctrl_down = modifiers.state().control_key();
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(engine) = &mut self.engine {
                    let pointer = Vec2::new(position.x as f32, position.y as f32);
                    self.input.on_pointer_move(&mut self.runtime, engine, pointer);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(engine) = &self.engine {
                    self.input.on_pointer_leave(&mut self.runtime, engine);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    match state {
                        ElementState::Pressed => {
                            self.input.on_pointer_down(&mut self.runtime, self.input.pointer);
                        }
                        ElementState::Released => {
                            if let Some(engine) = &self.engine {
                                self.input.on_pointer_up(&mut self.runtime, engine);
                            }
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(engine) = &mut self.engine {
                    let scroll = match delta {
                        winit::event::MouseScrollDelta::LineDelta(_, y) => y,
                        winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                    };
                    self.input.on_scroll(&self.runtime, engine, scroll);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let winit::keyboard::PhysicalKey::Code(code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            self.input.keys_down.insert(code);
                            match code {
                                KeyCode::Escape => {
                                    if self.runtime.interaction.followed_track_id().is_some() {
                                        self.runtime.unfollow();
                                    } else {
                                        self.close_requested = true;
                                    }
                                }
                                KeyCode::KeyR => {
                                    if let Some(engine) = &mut self.engine {
                                        self.runtime.reset_view(engine);
                                    }
                                }
                                KeyCode::Space => {
                                    self.runtime.toggle_playback();
                                }
                                _ => {}
                            }
                        }
                        ElementState::Released => {
                            self.input.keys_down.remove(&code);
                        }
                    }
                }
            }
            _ => {}
        }

        if self.close_requested {
            event_loop.exit();
        }
    }
}

/// Runs the viewer until the window closes. Blocks the calling thread.
pub fn run_app(runtime: ViewerRuntime) {
    let event_loop = EventLoop::new().expect("failed to create event loop");
    let mut app = App::new(runtime);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("event loop exited with error: {e}");
    }
}
