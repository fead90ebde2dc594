//! `wgpu` backend for the render loop.
//!
//! - `context` owns the instance, device and swapchain and rebuilds the
//!   swapchain when the surface resizes.
//! - `pipeline` compiles the GLSL stages and links them into a triangle-strip
//!   render pipeline over a signed-byte screen quad.
//! - `uniforms` mirrors the `YinYangParams` std140 block.
//! - `state` ties them together as a [`GpuBackend`](crate::GpuBackend).

mod context;
mod pipeline;
mod state;
mod uniforms;

pub use pipeline::YinYangPipeline;
pub(crate) use state::GpuState;
