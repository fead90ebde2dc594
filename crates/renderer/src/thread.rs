//! Dedicated render thread driving a [`RenderLoop`].
//!
//! The thread owns the backend and every GPU object it creates. Other
//! contexts talk to it only through a command channel, plus the shared touch
//! state that [`TouchInput`] writes directly.

use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use tracing::{debug, info};

use crate::compile::ShaderSources;
use crate::engine::{FrameRequest, GpuBackend, RenderLoop, WallpaperEngine};
use crate::events::EventSender;
use crate::runtime::SharedClock;
use crate::touch::{SharedTouch, TouchEvent};

const THREAD_NAME: &str = "yinyang-render";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderCommand {
    SurfaceCreated,
    Resize { width: u32, height: u32 },
    Visibility(bool),
    Redraw,
    Shutdown,
}

/// Handle to the render thread. Dropping it stops and joins the thread.
pub struct RenderThread {
    commands: Sender<RenderCommand>,
    touch: SharedTouch,
    clock: SharedClock,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl RenderThread {
    /// Spawns the render thread and builds the backend on it with `factory`.
    ///
    /// Returns once the backend exists, or with the factory's error.
    pub fn spawn<B, F>(
        factory: F,
        sources: ShaderSources,
        clock: SharedClock,
        events: EventSender,
    ) -> Result<Self>
    where
        B: GpuBackend + 'static,
        F: FnOnce() -> Result<B> + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded(1);
        let (command_tx, command_rx) = unbounded();
        let touch = SharedTouch::new();

        let thread_touch = touch.clone();
        let thread_clock = clock.clone();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                let backend = match factory() {
                    Ok(backend) => backend,
                    Err(err) => {
                        let message = format!("{err:#}");
                        let _ = ready_tx.send(Err(anyhow!(message)));
                        return Err(err);
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let engine = RenderLoop::new(backend, sources, thread_touch, thread_clock, events);
                run_render_thread(engine, command_rx);
                Ok(())
            })
            .map_err(|err| anyhow!("failed to spawn render thread: {err}"))?;

        ready_rx
            .recv()
            .map_err(|err| anyhow!("render thread failed to initialise: {err}"))??;

        Ok(Self {
            commands: command_tx,
            touch,
            clock,
            join_handle: Some(handle),
        })
    }

    /// Handle for the input context.
    pub fn touch_input(&self) -> TouchInput {
        TouchInput {
            touch: self.touch.clone(),
            clock: self.clock.clone(),
            commands: self.commands.clone(),
        }
    }

    pub fn shared_touch(&self) -> &SharedTouch {
        &self.touch
    }

    /// The surface was created or recreated; (re)builds the shader program.
    pub fn surface_created(&self) {
        self.send(RenderCommand::SurfaceCreated);
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.send(RenderCommand::Resize { width, height });
    }

    pub fn set_visible(&self, visible: bool) {
        self.send(RenderCommand::Visibility(visible));
    }

    pub fn request_redraw(&self) {
        self.send(RenderCommand::Redraw);
    }

    fn send(&self, command: RenderCommand) {
        if self.commands.send(command).is_err() {
            debug!(?command, "render thread has exited; command dropped");
        }
    }

    /// Stops the thread and waits for it, surfacing its error if any.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.commands.send(RenderCommand::Shutdown);
            handle
                .join()
                .map_err(|err| anyhow!("render thread panicked: {err:?}"))??;
        }
        Ok(())
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.commands.send(RenderCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

/// Input-side handle: writes touch samples into the shared state and asks the
/// render thread for a frame.
#[derive(Clone)]
pub struct TouchInput {
    touch: SharedTouch,
    clock: SharedClock,
    commands: Sender<RenderCommand>,
}

impl TouchInput {
    pub fn on_touch(&self, event: TouchEvent) {
        if self.touch.apply(event, self.clock.now_ms()) {
            let _ = self.commands.send(RenderCommand::Redraw);
        }
    }
}

fn run_render_thread<B: GpuBackend>(mut engine: RenderLoop<B>, commands: Receiver<RenderCommand>) {
    let mut dirty = false;
    loop {
        // Drain everything queued before drawing so bursts of requests collapse
        // into a single frame. Block only when there is nothing to draw.
        let command = if dirty && engine.is_visible() {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(RenderCommand::SurfaceCreated) => {
                engine.on_create();
                dirty = true;
            }
            Some(RenderCommand::Resize { width, height }) => {
                engine.on_resize(width, height);
                dirty = true;
            }
            Some(RenderCommand::Visibility(visible)) => {
                engine.on_visibility_change(visible);
                if visible {
                    dirty = true;
                }
            }
            Some(RenderCommand::Redraw) => dirty = true,
            Some(RenderCommand::Shutdown) => break,
            None => {
                dirty = engine.on_draw_frame() == FrameRequest::Continue;
            }
        }
    }
    info!(frames = engine.frame_count(), "render thread stopped");
}
