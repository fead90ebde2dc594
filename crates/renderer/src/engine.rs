//! The render loop and the seams it talks through.
//!
//! ```text
//!   host surface ──▶ WallpaperEngine ──▶ RenderLoop ──▶ GpuBackend ──▶ pixels
//!                         (create, resize,      │
//!                          visibility, touch,   ├─▶ SharedTouch (decay)
//!                          draw)                └─▶ RenderEvent channel
//! ```
//!
//! `RenderLoop` holds no platform types. Hosts call it through
//! [`WallpaperEngine`] and hand it a [`GpuBackend`]; the `wgpu` backend lives in
//! `gpu`, tests plug in a recording double.

use tracing::{debug, error, info, trace, warn};

use crate::compile::{ShaderError, ShaderSources};
use crate::events::{EventSender, RenderEvent};
use crate::runtime::SharedClock;
use crate::touch::{SharedTouch, TouchEvent};
use crate::viewport::Viewport;

/// Lifecycle callbacks a host surface drives.
pub trait WallpaperEngine {
    /// The surface (and its GPU context) was created or recreated.
    fn on_create(&mut self);
    /// The surface changed size.
    fn on_resize(&mut self, width: u32, height: u32);
    /// The wallpaper became visible or hidden.
    fn on_visibility_change(&mut self, visible: bool);
    /// A touch sample arrived from the host.
    fn on_touch(&mut self, event: TouchEvent);
    /// Produces one frame and says whether another one is wanted.
    fn on_draw_frame(&mut self) -> FrameRequest;
}

/// Whether the loop wants another frame without further input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Nothing is animating; wait for the next explicit request.
    Idle,
    /// Schedule another frame.
    Continue,
}

/// Values uploaded to the shader uniforms for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub aspect_ratio: [f32; 2],
    pub touch_start: [f32; 2],
    pub touch_current: [f32; 2],
}

/// A draw of the screen quad with `program`.
#[derive(Debug)]
pub struct DrawCall<'a, P> {
    pub program: &'a P,
    pub params: FrameParams,
}

/// Presentation failures a backend reports from [`GpuBackend::present`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The frame was dropped but the surface has been reconfigured; drawing
    /// again should succeed.
    #[error("frame dropped: {0}")]
    Retry(String),
    /// The frame was dropped; the next requested frame may try again.
    #[error("frame skipped: {0}")]
    Skip(String),
    /// The surface cannot be used any more.
    #[error("fatal surface error: {0}")]
    Fatal(String),
}

/// GPU operations the render loop needs.
///
/// Every frame starts from a buffer cleared to opaque black.
/// `present(None)` shows just that; `present(Some(draw))` draws the screen
/// quad on top as a triangle strip with culling, blending and depth testing
/// disabled.
pub trait GpuBackend {
    /// Linked program handle.
    type Program;

    /// Whether the device can compile shaders at runtime.
    fn shader_compiler_supported(&mut self) -> bool;

    /// Compiles both stages and links them into a program.
    fn build_program(&mut self, sources: &ShaderSources) -> Result<Self::Program, ShaderError>;

    /// Reconfigures the drawable for a new viewport.
    fn resize(&mut self, viewport: Viewport);

    fn present(&mut self, draw: Option<DrawCall<'_, Self::Program>>) -> Result<(), FrameError>;
}

/// Externally visible state of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Waiting for the surface to be created.
    Pending,
    /// Program linked; frames draw geometry.
    Ready,
    /// The device cannot compile shaders; frames are cleared only.
    Unsupported,
    /// Shader build or surface failure; frames are cleared only.
    Failed,
}

enum Mode<P> {
    Pending,
    Ready(P),
    Unsupported,
    Failed,
}

/// Single-effect render loop driving a [`GpuBackend`].
pub struct RenderLoop<B: GpuBackend> {
    backend: B,
    sources: ShaderSources,
    touch: SharedTouch,
    clock: SharedClock,
    events: EventSender,
    mode: Mode<B::Program>,
    compiler_reported: bool,
    visible: bool,
    retried: bool,
    frame_count: u64,
}

impl<B: GpuBackend> RenderLoop<B> {
    pub fn new(
        backend: B,
        sources: ShaderSources,
        touch: SharedTouch,
        clock: SharedClock,
        events: EventSender,
    ) -> Self {
        Self {
            backend,
            sources,
            touch,
            clock,
            events,
            mode: Mode::Pending,
            compiler_reported: false,
            visible: false,
            retried: false,
            frame_count: 0,
        }
    }

    pub fn status(&self) -> RenderStatus {
        match self.mode {
            Mode::Pending => RenderStatus::Pending,
            Mode::Ready(_) => RenderStatus::Ready,
            Mode::Unsupported => RenderStatus::Unsupported,
            Mode::Failed => RenderStatus::Failed,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Frames presented so far, including clear-only frames.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn touch(&self) -> &SharedTouch {
        &self.touch
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn emit(&self, event: RenderEvent) {
        if self.events.send(event).is_err() {
            debug!("render event receiver dropped; event discarded");
        }
    }

    /// Presents one frame; `Ok(true)` while the touch point is still decaying.
    fn present(&mut self) -> Result<bool, FrameError> {
        let Mode::Ready(program) = &self.mode else {
            return self.backend.present(None).map(|()| false);
        };
        let (viewport, touch, animating) = self.touch.advance(self.clock.now_ms());
        let params = FrameParams {
            aspect_ratio: viewport.aspect_ratio(),
            touch_start: touch.start,
            touch_current: touch.current,
        };
        trace!(
            frame = self.frame_count,
            following = touch.following,
            current = ?touch.current,
            "presenting frame"
        );
        self.backend
            .present(Some(DrawCall { program, params }))
            .map(|()| animating)
    }

    fn handle_frame_error(&mut self, err: FrameError) -> FrameRequest {
        match err {
            // One immediate retry after a reconfigure; a surface that stays
            // broken waits for the next request instead of spinning.
            FrameError::Retry(reason) if !self.retried => {
                debug!(%reason, "frame dropped; retrying");
                self.retried = true;
                FrameRequest::Continue
            }
            FrameError::Retry(reason) => {
                warn!(%reason, "frame dropped again; waiting for the next request");
                FrameRequest::Idle
            }
            FrameError::Skip(reason) => {
                debug!(%reason, "frame skipped");
                FrameRequest::Idle
            }
            FrameError::Fatal(reason) => {
                error!(%reason, "surface failed; rendering disabled");
                self.mode = Mode::Failed;
                self.emit(RenderEvent::SurfaceFatal { reason });
                FrameRequest::Idle
            }
        }
    }
}

impl<B: GpuBackend> WallpaperEngine for RenderLoop<B> {
    fn on_create(&mut self) {
        match self.mode {
            Mode::Unsupported | Mode::Failed => {
                debug!(status = ?self.status(), "surface recreated after terminal failure; ignoring");
                return;
            }
            Mode::Pending | Mode::Ready(_) => {}
        }

        if !self.backend.shader_compiler_supported() {
            warn!("shader compiler unavailable; rendering disabled for this session");
            self.mode = Mode::Unsupported;
            if !self.compiler_reported {
                self.compiler_reported = true;
                self.emit(RenderEvent::ShaderCompilerUnsupported);
            }
            return;
        }

        match self.backend.build_program(&self.sources) {
            Ok(program) => {
                info!("yin-yang shader program ready");
                self.mode = Mode::Ready(program);
            }
            Err(err) => {
                error!(error = %err, "failed to build shader program; rendering disabled");
                self.mode = Mode::Failed;
                self.emit(RenderEvent::ShaderBuildFailed {
                    log: err.to_string(),
                });
            }
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        let Some(viewport) = Viewport::new(width, height) else {
            debug!(width, height, "ignoring resize to an empty surface");
            return;
        };
        debug!(width, height, aspect = ?viewport.aspect_ratio(), "surface resized");
        self.touch.set_viewport(viewport);
        self.backend.resize(viewport);
    }

    fn on_visibility_change(&mut self, visible: bool) {
        debug!(visible, "visibility changed");
        self.visible = visible;
    }

    fn on_touch(&mut self, event: TouchEvent) {
        self.touch.apply(event, self.clock.now_ms());
    }

    fn on_draw_frame(&mut self) -> FrameRequest {
        let result = self.present();
        self.frame_count = self.frame_count.saturating_add(1);
        match result {
            Ok(animating) => {
                self.retried = false;
                if animating {
                    FrameRequest::Continue
                } else {
                    FrameRequest::Idle
                }
            }
            Err(err) => self.handle_frame_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events;
    use crate::runtime::ManualClock;
    use crate::touch::TouchAction;

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Clear,
        Draw(FrameParams),
    }

    #[derive(Default)]
    struct RecordingBackend {
        compiler_supported: bool,
        build_error: Option<ShaderError>,
        builds: usize,
        probes: usize,
        frames: Vec<Recorded>,
        resizes: Vec<Viewport>,
        next_error: Option<FrameError>,
        failing: Option<FrameError>,
        attempts: usize,
    }

    impl RecordingBackend {
        fn supported() -> Self {
            Self {
                compiler_supported: true,
                ..Self::default()
            }
        }
    }

    impl GpuBackend for RecordingBackend {
        type Program = usize;

        fn shader_compiler_supported(&mut self) -> bool {
            self.probes += 1;
            self.compiler_supported
        }

        fn build_program(&mut self, _sources: &ShaderSources) -> Result<usize, ShaderError> {
            self.builds += 1;
            match self.build_error.clone() {
                Some(err) => Err(err),
                None => Ok(self.builds),
            }
        }

        fn resize(&mut self, viewport: Viewport) {
            self.resizes.push(viewport);
        }

        fn present(&mut self, draw: Option<DrawCall<'_, usize>>) -> Result<(), FrameError> {
            self.attempts += 1;
            if let Some(err) = self.failing.clone() {
                return Err(err);
            }
            if let Some(err) = self.next_error.take() {
                return Err(err);
            }
            self.frames.push(match draw {
                Some(call) => Recorded::Draw(call.params),
                None => Recorded::Clear,
            });
            Ok(())
        }
    }

    struct Harness {
        engine: RenderLoop<RecordingBackend>,
        clock: Arc<ManualClock>,
        events: events::EventReceiver,
    }

    fn harness(backend: RecordingBackend) -> Harness {
        let clock = Arc::new(ManualClock::new(0));
        let (tx, rx) = events::channel();
        let engine = RenderLoop::new(
            backend,
            ShaderSources::bundled(),
            SharedTouch::new(),
            clock.clone(),
            tx,
        );
        Harness {
            engine,
            clock,
            events: rx,
        }
    }

    #[test]
    fn unsupported_compiler_clears_and_reports_once() {
        let mut h = harness(RecordingBackend::default());
        h.engine.on_create();
        h.engine.on_resize(1080, 1920);
        h.engine.on_touch(TouchEvent::new(TouchAction::Down, 10.0, 10.0));

        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Idle);
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Idle);
        // A recreated surface must not repeat the notification.
        h.engine.on_create();

        assert_eq!(h.engine.status(), RenderStatus::Unsupported);
        assert_eq!(h.engine.backend().frames, vec![Recorded::Clear, Recorded::Clear]);
        assert_eq!(h.engine.backend().builds, 0);
        let events: Vec<_> = h.events.try_iter().collect();
        assert_eq!(events, vec![RenderEvent::ShaderCompilerUnsupported]);
    }

    #[test]
    fn build_failure_is_terminal() {
        let mut backend = RecordingBackend::supported();
        backend.build_error = Some(ShaderError::Link {
            log: "varying mismatch".into(),
        });
        let mut h = harness(backend);
        h.engine.on_create();
        h.engine.on_draw_frame();
        h.engine.on_create();

        assert_eq!(h.engine.status(), RenderStatus::Failed);
        assert_eq!(h.engine.backend().builds, 1);
        assert_eq!(h.engine.backend().frames, vec![Recorded::Clear]);
        match h.events.try_recv() {
            Ok(RenderEvent::ShaderBuildFailed { log }) => assert!(log.contains("varying mismatch")),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn ready_frame_uploads_aspect_and_touch() {
        let mut h = harness(RecordingBackend::supported());
        h.engine.on_create();
        h.engine.on_resize(1000, 2000);
        h.engine.on_touch(TouchEvent::new(TouchAction::Down, 500.0, 1000.0));

        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Idle);
        let viewport = Viewport::new(1000, 2000).unwrap();
        assert_eq!(
            h.engine.backend().frames,
            vec![Recorded::Draw(FrameParams {
                aspect_ratio: viewport.aspect_ratio(),
                touch_start: [0.0, 0.0],
                touch_current: [0.0, 0.0],
            })]
        );
        assert_eq!(h.engine.backend().resizes, vec![viewport]);
    }

    #[test]
    fn release_animates_until_settled() {
        let mut h = harness(RecordingBackend::supported());
        h.engine.on_create();
        h.engine.on_resize(100, 100);
        h.engine.on_touch(TouchEvent::new(TouchAction::Down, 50.0, 50.0));
        h.engine.on_touch(TouchEvent::new(TouchAction::Move, 80.0, 20.0));
        assert_eq!(
            h.engine.on_draw_frame(),
            FrameRequest::Idle,
            "following frames never self-schedule"
        );

        h.engine.on_touch(TouchEvent::new(TouchAction::Up, 80.0, 20.0));
        h.clock.advance(16);
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Continue);

        let mut frames = 0;
        loop {
            h.clock.advance(16);
            frames += 1;
            if h.engine.on_draw_frame() == FrameRequest::Idle {
                break;
            }
            assert!(frames < 250, "decay did not settle");
        }
        let touch = h.engine.touch().snapshot();
        assert!(!touch.displaced());
    }

    #[test]
    fn long_pause_snaps_back_in_one_frame() {
        let mut h = harness(RecordingBackend::supported());
        h.engine.on_create();
        h.engine.on_resize(100, 100);
        h.engine.on_touch(TouchEvent::new(TouchAction::Down, 50.0, 50.0));
        h.engine.on_touch(TouchEvent::new(TouchAction::Move, 90.0, 90.0));
        h.engine.on_touch(TouchEvent::new(TouchAction::Up, 90.0, 90.0));
        h.clock.advance(200);

        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Idle);
        match h.engine.backend().frames.last() {
            Some(Recorded::Draw(params)) => {
                assert!((params.touch_current[0] - params.touch_start[0]).abs() < 1e-6);
                assert!((params.touch_current[1] - params.touch_start[1]).abs() < 1e-6);
            }
            other => panic!("expected a draw, got {other:?}"),
        }
    }

    #[test]
    fn zero_sized_resize_keeps_previous_viewport() {
        let mut h = harness(RecordingBackend::supported());
        h.engine.on_resize(640, 480);
        h.engine.on_resize(0, 480);
        assert_eq!(h.engine.touch().viewport(), Viewport::new(640, 480).unwrap());
        assert_eq!(h.engine.backend().resizes.len(), 1);
    }

    #[test]
    fn retryable_frame_error_requests_another_frame() {
        let mut backend = RecordingBackend::supported();
        backend.next_error = Some(FrameError::Retry("outdated".into()));
        let mut h = harness(backend);
        h.engine.on_create();
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Continue);
        assert_eq!(h.engine.status(), RenderStatus::Ready);
        assert!(h.events.try_recv().is_err());
    }

    fn continues_until_idle(engine: &mut RenderLoop<RecordingBackend>) -> usize {
        let mut continues = 0;
        while engine.on_draw_frame() == FrameRequest::Continue {
            continues += 1;
            assert!(continues < 10, "render loop keeps rescheduling a failing frame");
        }
        continues
    }

    #[test]
    fn persistent_retry_error_is_retried_once() {
        let mut backend = RecordingBackend::supported();
        backend.failing = Some(FrameError::Retry("outdated".into()));
        let mut h = harness(backend);
        h.engine.on_create();

        assert_eq!(continues_until_idle(&mut h.engine), 1);
        assert_eq!(h.engine.backend().attempts, 2);
        // The next explicit request is not granted a second immediate retry.
        assert_eq!(continues_until_idle(&mut h.engine), 0);
        assert_eq!(h.engine.status(), RenderStatus::Ready);
    }

    #[test]
    fn skipped_frames_wait_for_the_next_request() {
        let mut backend = RecordingBackend::supported();
        backend.failing = Some(FrameError::Skip("timed out".into()));
        let mut h = harness(backend);
        h.engine.on_create();
        h.engine.on_resize(100, 100);
        h.engine.on_touch(TouchEvent::new(TouchAction::Down, 50.0, 50.0));
        h.engine.on_touch(TouchEvent::new(TouchAction::Move, 90.0, 10.0));
        h.engine.on_touch(TouchEvent::new(TouchAction::Up, 90.0, 10.0));

        assert_eq!(continues_until_idle(&mut h.engine), 0);
        assert_eq!(h.engine.backend().attempts, 1);
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn successful_frame_rearms_the_retry() {
        let mut backend = RecordingBackend::supported();
        backend.next_error = Some(FrameError::Retry("lost".into()));
        let mut h = harness(backend);
        h.engine.on_create();
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Continue);
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Idle);

        h.engine.backend.next_error = Some(FrameError::Retry("outdated".into()));
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Continue);
    }

    #[test]
    fn fatal_frame_error_disables_rendering() {
        let mut backend = RecordingBackend::supported();
        backend.next_error = Some(FrameError::Fatal("out of memory".into()));
        let mut h = harness(backend);
        h.engine.on_create();
        assert_eq!(h.engine.on_draw_frame(), FrameRequest::Idle);
        assert_eq!(h.engine.status(), RenderStatus::Failed);
        assert_eq!(
            h.events.try_recv().ok(),
            Some(RenderEvent::SurfaceFatal {
                reason: "out of memory".into()
            })
        );
        h.engine.on_draw_frame();
        assert_eq!(h.engine.backend().frames, vec![Recorded::Clear]);
    }

    #[test]
    fn recreated_surface_rebuilds_program() {
        let mut h = harness(RecordingBackend::supported());
        h.engine.on_create();
        h.engine.on_create();
        assert_eq!(h.engine.backend().builds, 2);
        assert_eq!(h.engine.status(), RenderStatus::Ready);
    }
}
