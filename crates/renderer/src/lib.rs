//! Renderer crate for the yin-yang live wallpaper.
//!
//! A single shader effect draws a yin-yang that bends towards the finger while
//! it is down and springs back once released. Frames are only produced on
//! demand:
//!
//! ```text
//!   host (winit window) ──▶ RenderThread ──▶ RenderLoop ──▶ GpuState (wgpu)
//!          │ TouchInput            ▲  commands      │
//!          └──▶ SharedTouch ◀──────┼────────────────┘ decay per frame
//!                                  └─ Redraw while the decay runs
//! ```
//!
//! [`RenderLoop`] implements the platform lifecycle ([`WallpaperEngine`])
//! against any [`GpuBackend`], so the loop logic runs without a GPU in tests.
//! [`Renderer`] is the thin entry point used by the desktop binary.

mod compile;
mod engine;
mod events;
mod gpu;
mod runtime;
mod thread;
mod touch;
mod types;
mod viewport;
mod window;

use anyhow::Result;

pub use compile::{
    validate, ShaderError, ShaderKind, ShaderSources, FRAGMENT_SHADER_FILE, VERTEX_SHADER_FILE,
};
pub use engine::{
    DrawCall, FrameError, FrameParams, FrameRequest, GpuBackend, RenderLoop, RenderStatus,
    WallpaperEngine,
};
pub use events::{
    channel, EventReceiver, EventSender, RenderEvent, SHADER_COMPILER_UNSUPPORTED_MESSAGE,
};
pub use gpu::YinYangPipeline;
pub use runtime::{Clock, ManualClock, SharedClock, SystemClock};
pub use thread::{RenderThread, TouchInput};
pub use touch::{SharedTouch, TouchAction, TouchEvent, TouchState, DECAY_PER_MS, SETTLE_EPSILON};
pub use types::{Antialiasing, ColorSpaceMode, GpuPowerPreference, RendererConfig};
pub use viewport::{Viewport, ASPECT_SCALE};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
    events: Option<EventSender>,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Routes [`RenderEvent`]s to `events`. Without a sender they are logged
    /// and dropped.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Opens the wallpaper window and blocks until it closes.
    ///
    /// Fails if the event loop, window, or GPU device cannot be created, or
    /// if a shader override directory is unreadable.
    pub fn run(&mut self) -> Result<()> {
        let events = match self.events.clone() {
            Some(events) => events,
            None => channel().0,
        };
        window::run(&self.config, events)
    }
}
