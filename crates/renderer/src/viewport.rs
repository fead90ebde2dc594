/// Scale applied on top of the short-side normalisation so the yin-yang disc
/// leaves a small margin on the narrow axis.
pub const ASPECT_SCALE: f32 = 1.1;

/// Surface dimensions plus the aspect-ratio pair handed to the shaders.
///
/// The aspect pair is only recomputed when a new viewport is built, which in
/// practice means on surface resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: u32,
    height: u32,
    aspect_ratio: [f32; 2],
}

impl Viewport {
    /// Builds a viewport for a `width`x`height` surface.
    ///
    /// Returns `None` when either dimension is zero; callers keep their
    /// previous viewport in that case.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let shortest = width.min(height) as f32;
        Some(Self {
            width,
            height,
            aspect_ratio: [
                ASPECT_SCALE * width as f32 / shortest,
                ASPECT_SCALE * height as f32 / shortest,
            ],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(x, y)` scale factors; the shorter axis is always `ASPECT_SCALE`.
    pub fn aspect_ratio(&self) -> [f32; 2] {
        self.aspect_ratio
    }

    /// Maps a pixel position (origin top-left, y down) into aspect-scaled
    /// device coordinates (origin centre, y up).
    pub fn normalize(&self, px: f32, py: f32) -> [f32; 2] {
        let width = self.width as f32;
        let height = self.height as f32;
        [
            (2.0 * px / width - 1.0) * self.aspect_ratio[0],
            (1.0 - 2.0 * py / height) * self.aspect_ratio[1],
        ]
    }

    /// Inverse of [`Viewport::normalize`].
    pub fn denormalize(&self, position: [f32; 2]) -> (f32, f32) {
        let width = self.width as f32;
        let height = self.height as f32;
        let x = (position[0] / self.aspect_ratio[0] + 1.0) * width * 0.5;
        let y = (1.0 - position[1] / self.aspect_ratio[1]) * height * 0.5;
        (x, y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            aspect_ratio: [ASPECT_SCALE, ASPECT_SCALE],
        }
    }
}
