use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

/// File name of the vertex stage inside a shader override directory.
pub const VERTEX_SHADER_FILE: &str = "yinyang.vert";
/// File name of the fragment stage inside a shader override directory.
pub const FRAGMENT_SHADER_FILE: &str = "yinyang.frag";

const BUNDLED_VERTEX_GLSL: &str = include_str!("../shaders/yinyang.vert");
const BUNDLED_FRAGMENT_GLSL: &str = include_str!("../shaders/yinyang.frag");

/// Smallest shader that exercises the runtime GLSL path. If the device
/// rejects this, it cannot compile anything.
const PROBE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(0.0, 0.0, 0.0, 1.0);
}
";

/// Pipeline stage a GLSL source targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    fn stage(self) -> ShaderStage {
        match self {
            ShaderKind::Vertex => ShaderStage::Vertex,
            ShaderKind::Fragment => ShaderStage::Fragment,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ShaderKind::Vertex => "yinyang vertex",
            ShaderKind::Fragment => "yinyang fragment",
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failure to turn the shader sources into a usable program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderKind, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
}

/// The vertex and fragment GLSL the program is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    /// Sources compiled into the crate.
    pub fn bundled() -> Self {
        Self {
            vertex: BUNDLED_VERTEX_GLSL.to_string(),
            fragment: BUNDLED_FRAGMENT_GLSL.to_string(),
        }
    }

    /// Loads `yinyang.vert` and `yinyang.frag` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read shader at {}", path.display()))
        };
        Ok(Self {
            vertex: read(VERTEX_SHADER_FILE)?,
            fragment: read(FRAGMENT_SHADER_FILE)?,
        })
    }

    /// Resolves an optional override directory, falling back to the bundled
    /// sources.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Ok(Self::bundled()),
        }
    }

    pub(crate) fn source(&self, kind: ShaderKind) -> &str {
        match kind {
            ShaderKind::Vertex => &self.vertex,
            ShaderKind::Fragment => &self.fragment,
        }
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::bundled()
    }
}

/// Parses and validates GLSL with naga so failures come back with a readable
/// info log instead of a device-level validation error.
pub fn validate(kind: ShaderKind, source: &str) -> Result<(), ShaderError> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(kind.stage()), source)
        .map_err(|errors| ShaderError::Compile {
            stage: kind,
            log: errors.emit_to_string(source),
        })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::empty());
    validator
        .validate(&module)
        .map_err(|error| ShaderError::Compile {
            stage: kind,
            log: error.emit_to_string(source),
        })?;
    Ok(())
}

/// Compiles one stage on the device, capturing validation errors instead of
/// letting them reach the uncaptured-error handler.
pub(crate) fn compile_stage(
    device: &wgpu::Device,
    sources: &ShaderSources,
    kind: ShaderKind,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let source = sources.source(kind);
    validate(kind, source)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(kind.label()),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage: kind.stage(),
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(ShaderError::Compile {
            stage: kind,
            log: error.to_string(),
        }),
        None => Ok(module),
    }
}

/// Checks whether the device accepts runtime GLSL at all.
pub(crate) fn probe_shader_compiler(device: &wgpu::Device) -> bool {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let _probe = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shader compiler probe"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(PROBE_FRAGMENT_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => {
            tracing::warn!(%error, "runtime shader compilation probe failed");
            false
        }
        None => true,
    }
}
