use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use yinyang_renderer::{
    channel, Clock, DrawCall, FrameError, FrameParams, GpuBackend, RenderEvent, RenderThread,
    ShaderError, ShaderSources, SystemClock, TouchAction, TouchEvent, Viewport,
};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Clear,
    Draw(FrameParams),
}

struct ChannelBackend {
    compiler_supported: bool,
    frames: Sender<Frame>,
}

impl GpuBackend for ChannelBackend {
    type Program = ();

    fn shader_compiler_supported(&mut self) -> bool {
        self.compiler_supported
    }

    fn build_program(&mut self, _sources: &ShaderSources) -> Result<(), ShaderError> {
        Ok(())
    }

    fn resize(&mut self, _viewport: Viewport) {}

    fn present(&mut self, draw: Option<DrawCall<'_, ()>>) -> Result<(), FrameError> {
        let frame = match draw {
            Some(call) => Frame::Draw(call.params),
            None => Frame::Clear,
        };
        let _ = self.frames.send(frame);
        Ok(())
    }
}

/// Counts presents and fails every one of them with `error`.
struct BrokenSurface {
    error: FrameError,
    presents: Arc<AtomicUsize>,
}

impl GpuBackend for BrokenSurface {
    type Program = ();

    fn shader_compiler_supported(&mut self) -> bool {
        true
    }

    fn build_program(&mut self, _sources: &ShaderSources) -> Result<(), ShaderError> {
        Ok(())
    }

    fn resize(&mut self, _viewport: Viewport) {}

    fn present(&mut self, _draw: Option<DrawCall<'_, ()>>) -> Result<(), FrameError> {
        self.presents.fetch_add(1, Ordering::AcqRel);
        Err(self.error.clone())
    }
}

/// Moves forward by one frame interval every time it is read, so the decay
/// animation makes progress however fast the thread spins.
#[derive(Default)]
struct SteppingClock {
    now: AtomicU64,
}

impl Clock for SteppingClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(16, Ordering::AcqRel)
    }
}

fn spawn(
    compiler_supported: bool,
    clock: Arc<dyn Clock>,
) -> (RenderThread, Receiver<Frame>, yinyang_renderer::EventReceiver) {
    let (frame_tx, frame_rx) = unbounded();
    let (event_tx, event_rx) = channel();
    let render = RenderThread::spawn(
        move || {
            Ok(ChannelBackend {
                compiler_supported,
                frames: frame_tx,
            })
        },
        ShaderSources::bundled(),
        clock,
        event_tx,
    )
    .expect("render thread starts");
    (render, frame_rx, event_rx)
}

fn start_visible(render: &RenderThread, frames: &Receiver<Frame>) {
    render.resize(200, 100);
    render.surface_created();
    render.set_visible(true);
    frames.recv_timeout(WAIT).expect("initial frame");
    drain(frames);
}

fn drain(frames: &Receiver<Frame>) -> Vec<Frame> {
    let mut seen = Vec::new();
    while let Ok(frame) = frames.recv_timeout(QUIET) {
        seen.push(frame);
    }
    seen
}

#[test]
fn backend_is_built_on_the_named_render_thread() {
    let (events, _rx) = channel();
    let (name_tx, name_rx) = unbounded();
    let render = RenderThread::spawn(
        move || {
            let _ = name_tx.send(thread::current().name().map(str::to_owned));
            let (frames, _) = unbounded();
            Ok(ChannelBackend {
                compiler_supported: true,
                frames,
            })
        },
        ShaderSources::bundled(),
        SystemClock::shared(),
        events,
    )
    .unwrap();

    assert_eq!(name_rx.recv().unwrap().as_deref(), Some("yinyang-render"));
    render.shutdown().unwrap();
}

#[test]
fn factory_errors_are_returned_from_spawn() {
    let (events, _rx) = channel();
    let result = RenderThread::spawn(
        || -> anyhow::Result<ChannelBackend> { anyhow::bail!("no adapter") },
        ShaderSources::bundled(),
        SystemClock::shared(),
        events,
    );
    let err = result.err().expect("spawn must fail");
    assert!(format!("{err:#}").contains("no adapter"));
}

#[test]
fn touch_requests_a_frame_with_the_touch_position() {
    let (render, frames, _events) = spawn(true, SystemClock::shared());
    start_visible(&render, &frames);

    let input = render.touch_input();
    input.on_touch(TouchEvent::new(TouchAction::Down, 100.0, 50.0));

    match frames.recv_timeout(WAIT).expect("touch frame") {
        Frame::Draw(params) => {
            assert_eq!(params.aspect_ratio, Viewport::new(200, 100).unwrap().aspect_ratio());
            assert!((params.aspect_ratio[0] - 2.2).abs() < 1e-5);
            assert_eq!(params.touch_start, [0.0, 0.0]);
            assert_eq!(params.touch_current, [0.0, 0.0]);
        }
        other => panic!("expected a draw, got {other:?}"),
    }
    render.shutdown().unwrap();
}

#[test]
fn redraws_while_hidden_wait_for_visibility() {
    let (render, frames, _events) = spawn(true, SystemClock::shared());
    start_visible(&render, &frames);

    render.set_visible(false);
    render.request_redraw();
    render.request_redraw();
    assert!(drain(&frames).is_empty(), "hidden wallpaper must not draw");

    render.set_visible(true);
    frames.recv_timeout(WAIT).expect("deferred frame");
    assert!(drain(&frames).is_empty(), "queued redraws coalesce");
    render.shutdown().unwrap();
}

#[test]
fn release_animates_back_and_then_goes_idle() {
    let clock = Arc::new(SteppingClock::default());
    let (render, frames, _events) = spawn(true, clock);
    start_visible(&render, &frames);

    let input = render.touch_input();
    input.on_touch(TouchEvent::new(TouchAction::Down, 100.0, 50.0));
    input.on_touch(TouchEvent::new(TouchAction::Move, 180.0, 10.0));
    input.on_touch(TouchEvent::new(TouchAction::Up, 180.0, 10.0));

    let seen = drain(&frames);
    assert!(seen.len() > 2, "decay should take several frames, got {}", seen.len());
    assert!(seen.iter().all(|frame| matches!(frame, Frame::Draw(_))));
    assert!(!render.shared_touch().snapshot().displaced());

    render.request_redraw();
    assert_eq!(drain(&frames).len(), 1, "settled wallpaper draws once per request");
    render.shutdown().unwrap();
}

#[test]
fn unsupported_compiler_reports_once_and_clears() {
    let (render, frames, events) = spawn(false, SystemClock::shared());
    render.resize(200, 100);
    render.surface_created();
    render.set_visible(true);
    assert_eq!(frames.recv_timeout(WAIT).expect("frame"), Frame::Clear);

    render.surface_created();
    render
        .touch_input()
        .on_touch(TouchEvent::new(TouchAction::Down, 1.0, 1.0));
    assert!(drain(&frames).iter().all(|frame| *frame == Frame::Clear));

    render.shutdown().unwrap();
    let reported: Vec<_> = events.try_iter().collect();
    assert_eq!(reported, vec![RenderEvent::ShaderCompilerUnsupported]);
}

#[test]
fn dropping_the_handle_stops_the_thread() {
    let (render, frames, _events) = spawn(true, SystemClock::shared());
    start_visible(&render, &frames);
    let input = render.touch_input();
    drop(render);

    // The backend (and its frame sender) is gone once the thread has joined.
    assert!(frames.recv_timeout(WAIT).is_err());
    input.on_touch(TouchEvent::new(TouchAction::Down, 1.0, 1.0));
}

#[test]
fn broken_surface_does_not_spin_the_render_thread() {
    for error in [
        FrameError::Retry("surface outdated".into()),
        FrameError::Skip("surface timed out".into()),
    ] {
        let (events, _rx) = channel();
        let presents = Arc::new(AtomicUsize::new(0));
        let counter = presents.clone();
        let render = RenderThread::spawn(
            move || {
                Ok(BrokenSurface {
                    error,
                    presents: counter,
                })
            },
            ShaderSources::bundled(),
            SystemClock::shared(),
            events,
        )
        .expect("render thread starts");

        render.resize(200, 100);
        render.surface_created();
        render.set_visible(true);
        thread::sleep(QUIET);

        let count = presents.load(Ordering::Acquire);
        assert!(
            (1..=2).contains(&count),
            "one request should cost at most two presents, got {count}"
        );
        render.shutdown().unwrap();
    }
}
