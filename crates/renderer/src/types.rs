use std::path::PathBuf;

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count up to 4x supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain, matching how the shader colours were tuned.
    #[default]
    Auto,
    /// Treat shader outputs as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains for conversion.
    Linear,
}

/// Adapter selection hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated GPUs; a wallpaper idles most of the time.
    #[default]
    Low,
    High,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors CLI flags and the config file and tells the
/// renderer how large the surface should be, which shader sources to build,
/// and how to pick GPU resources.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Window or surface size in physical pixels.
    pub surface_size: (u32, u32),
    /// Directory holding `yinyang.vert`/`yinyang.frag` overrides; `None`
    /// uses the bundled shaders.
    pub shader_dir: Option<PathBuf>,
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    /// Desired color handling for the swapchain.
    pub color_space: ColorSpaceMode,
    /// Adapter power preference.
    pub gpu_power: GpuPowerPreference,
}

impl Default for RendererConfig {
    /// A 1080x1920 portrait surface with the bundled shaders.
    fn default() -> Self {
        Self {
            surface_size: (1080, 1920),
            shader_dir: None,
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            gpu_power: GpuPowerPreference::default(),
        }
    }
}
