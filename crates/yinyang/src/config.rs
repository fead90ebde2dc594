use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use yinyang_renderer::{Antialiasing, ColorSpaceMode, GpuPowerPreference, RendererConfig};

use crate::cli::{self, RunArgs};

/// Environment variable pointing at an alternative config file.
pub const ENV_CONFIG: &str = "YINYANG_CONFIG";

const CONFIG_FILE: &str = "config.toml";
const QUALIFIER: &str = "org";
const ORGANISATION: &str = "YinYang";
const APPLICATION: &str = "yinyang";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to determine the user config directory")]
    NoConfigDir,
}

/// On-disk settings. Every key is optional; missing keys keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antialias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_power: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shader_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `path`; a missing file is not an error and yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Describes a resolved configuration in file form.
    pub fn from_renderer(config: &RendererConfig) -> Self {
        let (width, height) = config.surface_size;
        Self {
            size: Some(format!("{width}x{height}")),
            antialias: Some(
                match config.antialiasing {
                    Antialiasing::Auto => "auto".to_string(),
                    Antialiasing::Off => "off".to_string(),
                    Antialiasing::Samples(samples) => samples.to_string(),
                },
            ),
            color_space: Some(
                match config.color_space {
                    ColorSpaceMode::Auto => "auto",
                    ColorSpaceMode::Gamma => "gamma",
                    ColorSpaceMode::Linear => "linear",
                }
                .to_string(),
            ),
            gpu_power: Some(
                match config.gpu_power {
                    GpuPowerPreference::Low => "low",
                    GpuPowerPreference::High => "high",
                }
                .to_string(),
            ),
            shader_dir: config.shader_dir.clone(),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Config file location: `--config`/`YINYANG_CONFIG` if given, otherwise
/// `config.toml` in the per-user config directory.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let dirs =
        ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION).ok_or(ConfigError::NoConfigDir)?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}

/// Layers defaults, then the file, then command-line flags.
pub fn resolve(file: Option<&FileConfig>, args: &RunArgs) -> Result<RendererConfig, ConfigError> {
    let mut config = RendererConfig::default();

    if let Some(file) = file {
        if let Some(size) = file.size.as_deref() {
            config.surface_size = parse_surface_size(size)?;
        }
        if let Some(mode) = file.antialias.as_deref() {
            config.antialiasing = cli::parse_antialias(mode).map_err(ConfigError::Invalid)?;
        }
        if let Some(mode) = file.color_space.as_deref() {
            config.color_space = cli::parse_color_space(mode).map_err(ConfigError::Invalid)?;
        }
        if let Some(power) = file.gpu_power.as_deref() {
            config.gpu_power = cli::parse_gpu_power(power).map_err(ConfigError::Invalid)?;
        }
        if let Some(dir) = &file.shader_dir {
            config.shader_dir = Some(dir.clone());
        }
    }

    if let Some(size) = args.size.as_deref() {
        config.surface_size = parse_surface_size(size)?;
    }
    if let Some(mode) = args.antialias {
        config.antialiasing = mode;
    }
    if let Some(mode) = args.color_space {
        config.color_space = mode;
    }
    if let Some(power) = args.gpu_power {
        config.gpu_power = power;
    }
    if let Some(dir) = &args.shader_dir {
        config.shader_dir = Some(dir.clone());
    }

    Ok(config)
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), ConfigError> {
    let trimmed = value.trim();
    let (width, height) = trimmed.split_once(['x', 'X', '×']).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "expected WxH size, e.g. 1080x1920, got '{trimmed}'"
        ))
    })?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid width in size '{trimmed}'")))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid height in size '{trimmed}'")))?;

    if width == 0 || height == 0 {
        return Err(ConfigError::Invalid(
            "surface dimensions must be greater than zero".to_string(),
        ));
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_with_any_separator() {
        assert_eq!(parse_surface_size("1080x1920").unwrap(), (1080, 1920));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert_eq!(parse_surface_size("800×600").unwrap(), (800, 600));
    }

    #[test]
    fn bad_sizes_are_rejected() {
        for value in ["1080", "0x100", "axb", "100x", "-1x5"] {
            assert!(
                matches!(parse_surface_size(value), Err(ConfigError::Invalid(_))),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn flags_override_file_values() {
        let file = FileConfig::parse(
            r#"
size = "720x1280"
antialias = "off"
gpu_power = "high"
"#,
        )
        .unwrap();
        let args = RunArgs {
            size: Some("1440x2560".into()),
            antialias: Some(Antialiasing::Samples(4)),
            ..RunArgs::default()
        };

        let config = resolve(Some(&file), &args).unwrap();
        assert_eq!(config.surface_size, (1440, 2560));
        assert_eq!(config.antialiasing, Antialiasing::Samples(4));
        assert_eq!(config.gpu_power, GpuPowerPreference::High);
        assert_eq!(config.color_space, ColorSpaceMode::Auto);
    }

    #[test]
    fn missing_file_and_flags_yield_defaults() {
        let config = resolve(None, &RunArgs::default()).unwrap();
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn invalid_file_values_are_config_errors() {
        let file = FileConfig::parse("color_space = \"hdr\"").unwrap();
        let err = resolve(Some(&file), &RunArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("hdr"));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let err = FileConfig::parse("fps = 60").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn resolved_config_round_trips_through_file_form() {
        let args = RunArgs {
            size: Some("300x200".into()),
            color_space: Some(ColorSpaceMode::Linear),
            ..RunArgs::default()
        };
        let config = resolve(None, &args).unwrap();
        let text = FileConfig::from_renderer(&config).to_toml().unwrap();
        let reparsed = FileConfig::parse(&text).unwrap();
        assert_eq!(resolve(Some(&reparsed), &RunArgs::default()).unwrap(), config);
    }

    #[test]
    fn explicit_path_wins() {
        let path = config_path(Some(Path::new("/etc/yinyang.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/etc/yinyang.toml"));
    }
}
