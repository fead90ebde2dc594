//! Touch tracking for the displacement effect.
//!
//! A gesture records where it started and where the finger currently is, both
//! in aspect-scaled device coordinates. While the finger is down the current
//! position follows it; once released, the render loop pulls the current
//! position back towards the start on every frame until the two coincide.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::viewport::Viewport;

/// Fraction of the remaining displacement removed per elapsed millisecond.
pub const DECAY_PER_MS: f32 = 0.005;

/// Displacement below which the animation counts as settled.
pub const SETTLE_EPSILON: f32 = 1e-4;

/// Phase of a pointer gesture as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down,
    Move,
    Up,
    /// The host aborted the gesture; treated like a release.
    Cancel,
}

/// A single pointer sample in surface pixels (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub x: f32,
    pub y: f32,
}

impl TouchEvent {
    pub fn new(action: TouchAction, x: f32, y: f32) -> Self {
        Self { action, x, y }
    }
}

/// Start and current touch positions plus the follow flag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchState {
    /// Where the gesture started.
    pub start: [f32; 2],
    /// Where the displaced point currently is.
    pub current: [f32; 2],
    /// True while a finger is down and `current` tracks it.
    pub following: bool,
    /// Timestamp of the last touch event or decay step.
    pub last_update_ms: u64,
}

impl TouchState {
    /// Applies a host touch event and reports whether a redraw is needed,
    /// which every action currently does.
    pub fn apply(&mut self, event: TouchEvent, viewport: &Viewport, now_ms: u64) -> bool {
        self.last_update_ms = now_ms;
        let position = viewport.normalize(event.x, event.y);
        match event.action {
            TouchAction::Down => {
                self.following = true;
                self.start = position;
                self.current = position;
            }
            TouchAction::Move => {
                self.current = position;
            }
            TouchAction::Up | TouchAction::Cancel => {
                self.following = false;
            }
        }
        true
    }

    /// Interpolates `current` towards `start` for the time elapsed since the
    /// last update.
    ///
    /// Returns true while displacement remains, meaning another frame should
    /// be requested. Does nothing while following a finger.
    pub fn settle(&mut self, now_ms: u64) -> bool {
        if self.following {
            return false;
        }

        let elapsed = now_ms.saturating_sub(self.last_update_ms);
        let t = (1.0 - elapsed as f32 * DECAY_PER_MS).max(0.0);
        for axis in 0..2 {
            self.current[axis] = self.start[axis] + (self.current[axis] - self.start[axis]) * t;
        }
        self.last_update_ms = now_ms;

        self.displaced()
    }

    /// True when `current` is further than [`SETTLE_EPSILON`] from `start` on
    /// either axis.
    pub fn displaced(&self) -> bool {
        (0..2).any(|axis| (self.start[axis] - self.current[axis]).abs() > SETTLE_EPSILON)
    }
}

#[derive(Debug, Default)]
struct TouchShared {
    viewport: Viewport,
    touch: TouchState,
}

/// Touch state and viewport shared between the input context and the render
/// thread.
///
/// Both sides hold the lock only for a handful of float copies. A reader sees
/// the state either before or after a whole event, never a torn update. A
/// touch that lands while a frame is being recorded shows up in the frame its
/// own redraw request produces, so at most one frame is stale.
#[derive(Debug, Clone, Default)]
pub struct SharedTouch {
    inner: Arc<Mutex<TouchShared>>,
}

impl SharedTouch {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TouchShared> {
        // The guarded data is plain floats; a panicked writer cannot leave it
        // in a state worse than a stale frame.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    /// Copy of the current touch state.
    pub fn snapshot(&self) -> TouchState {
        self.lock().touch
    }

    /// Applies a touch event against the latest viewport.
    pub fn apply(&self, event: TouchEvent, now_ms: u64) -> bool {
        let mut shared = self.lock();
        let viewport = shared.viewport;
        shared.touch.apply(event, &viewport, now_ms)
    }

    /// Runs one decay step and returns what the next frame should draw.
    ///
    /// The returned flag is true when the animation still has distance to
    /// cover and another frame should follow.
    pub fn advance(&self, now_ms: u64) -> (Viewport, TouchState, bool) {
        let mut shared = self.lock();
        let animating = shared.touch.settle(now_ms);
        (shared.viewport, shared.touch, animating)
    }
}
