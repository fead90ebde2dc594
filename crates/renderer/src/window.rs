use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::compile::ShaderSources;
use crate::events::EventSender;
use crate::gpu::GpuState;
use crate::runtime::SystemClock;
use crate::thread::RenderThread;
use crate::touch::{TouchAction, TouchEvent};
use crate::types::RendererConfig;

/// Opens the host window and forwards its lifecycle to a render thread until
/// the window closes.
pub(crate) fn run(config: &RendererConfig, events: EventSender) -> Result<()> {
    let sources = ShaderSources::resolve(config.shader_dir.as_deref())?;

    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("Yin Yang")
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create wallpaper window")?;
    let window = Arc::new(window);

    let initial_size = window.inner_size();
    let backend_window = window.clone();
    let backend_config = config.clone();
    let render = RenderThread::spawn(
        move || GpuState::new(backend_window, initial_size, &backend_config),
        sources,
        SystemClock::shared(),
        events,
    )?;
    info!(
        width = initial_size.width,
        height = initial_size.height,
        "render thread started"
    );

    render.resize(initial_size.width, initial_size.height);
    render.surface_created();
    render.set_visible(true);

    let input = render.touch_input();
    let mut pointer = PointerState::default();
    let mut render = Some(render);

    event_loop
        .run(move |event, elwt| {
            // Frames are requested explicitly; never spin the loop.
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    let Some(render) = render.as_ref() else {
                        return;
                    };
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::Resized(size) => {
                            render.resize(size.width, size.height);
                        }
                        WindowEvent::Occluded(occluded) => {
                            render.set_visible(!occluded);
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            if let Some(event) = pointer.cursor_moved(position) {
                                input.on_touch(event);
                            }
                        }
                        WindowEvent::CursorLeft { .. } => {
                            if let Some(event) = pointer.cursor_left() {
                                input.on_touch(event);
                            }
                        }
                        WindowEvent::MouseInput {
                            state,
                            button: MouseButton::Left,
                            ..
                        } => {
                            if let Some(event) = pointer.button(state) {
                                input.on_touch(event);
                            }
                        }
                        WindowEvent::Touch(touch) => {
                            input.on_touch(touch_event(&touch));
                        }
                        WindowEvent::RedrawRequested => {
                            render.request_redraw();
                        }
                        _ => {}
                    }
                }
                Event::Suspended => {
                    if let Some(render) = render.as_ref() {
                        render.set_visible(false);
                    }
                }
                Event::Resumed => {
                    if let Some(render) = render.as_ref() {
                        render.set_visible(true);
                    }
                }
                Event::LoopExiting => {
                    if let Some(render) = render.take() {
                        debug!("stopping render thread");
                        if let Err(err) = render.shutdown() {
                            error!(error = %err, "render thread exited with an error");
                        }
                    }
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

/// Turns mouse input into touch gestures: the left button acts as a finger.
#[derive(Debug, Default)]
struct PointerState {
    position: PhysicalPosition<f64>,
    pressed: bool,
}

impl PointerState {
    fn cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Option<TouchEvent> {
        self.position = position;
        self.pressed.then(|| self.event(TouchAction::Move))
    }

    fn button(&mut self, state: ElementState) -> Option<TouchEvent> {
        match (state, self.pressed) {
            (ElementState::Pressed, false) => {
                self.pressed = true;
                Some(self.event(TouchAction::Down))
            }
            (ElementState::Released, true) => {
                self.pressed = false;
                Some(self.event(TouchAction::Up))
            }
            _ => None,
        }
    }

    fn cursor_left(&mut self) -> Option<TouchEvent> {
        if !self.pressed {
            return None;
        }
        self.pressed = false;
        Some(self.event(TouchAction::Cancel))
    }

    fn event(&self, action: TouchAction) -> TouchEvent {
        TouchEvent::new(action, self.position.x as f32, self.position.y as f32)
    }
}

fn touch_event(touch: &Touch) -> TouchEvent {
    let action = match touch.phase {
        TouchPhase::Started => TouchAction::Down,
        TouchPhase::Moved => TouchAction::Move,
        TouchPhase::Ended => TouchAction::Up,
        TouchPhase::Cancelled => TouchAction::Cancel,
    };
    TouchEvent::new(action, touch.location.x as f32, touch.location.y as f32)
}
