use bytemuck::{Pod, Zeroable};

use crate::engine::FrameParams;

/// CPU mirror of the `YinYangParams` std140 block.
///
/// `uTouchPos` is a `vec2[2]`; std140 rounds each array element up to 16
/// bytes, so the xy pairs sit in the first half of two `vec4` slots.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct YinYangUniforms {
    pub aspect_ratio: [f32; 2],
    pub _padding0: [f32; 2],
    pub touch_pos: [[f32; 4]; 2],
}

unsafe impl Zeroable for YinYangUniforms {}
unsafe impl Pod for YinYangUniforms {}

impl YinYangUniforms {
    pub fn new(params: &FrameParams) -> Self {
        let [sx, sy] = params.touch_start;
        let [cx, cy] = params.touch_current;
        Self {
            aspect_ratio: params.aspect_ratio,
            _padding0: [0.0; 2],
            touch_pos: [[sx, sy, 0.0, 0.0], [cx, cy, 0.0, 0.0]],
        }
    }
}

impl Default for YinYangUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}
