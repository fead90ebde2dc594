use std::thread;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;
use yinyang_renderer::{EventReceiver, RenderEvent, Renderer};

use crate::cli::{Cli, Command, ConfigAction, RunArgs};
use crate::config::{self, FileConfig};

const DEFAULT_LOG_FILTER: &str =
    "warn,yinyang=info,yinyang_renderer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error";

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        Some(Command::Config(command)) => run_config(command.action, &cli.run),
        None => run_wallpaper(&cli.run),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &RunArgs) -> Result<yinyang_renderer::RendererConfig> {
    let path = config::config_path(args.config.as_deref())?;
    let file = FileConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    match &file {
        Some(_) => tracing::debug!(path = %path.display(), "loaded configuration file"),
        None => tracing::debug!(path = %path.display(), "no configuration file; using defaults"),
    }
    Ok(config::resolve(file.as_ref(), args)?)
}

fn run_config(action: ConfigAction, args: &RunArgs) -> Result<()> {
    match action {
        ConfigAction::Where => {
            let path = config::config_path(args.config.as_deref())?;
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(args)?;
            print!("{}", FileConfig::from_renderer(&config).to_toml()?);
        }
    }
    Ok(())
}

fn run_wallpaper(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    tracing::info!(
        width = config.surface_size.0,
        height = config.surface_size.1,
        antialias = ?config.antialiasing,
        color_space = ?config.color_space,
        gpu_power = ?config.gpu_power,
        shader_dir = ?config.shader_dir,
        "starting yin-yang wallpaper"
    );

    let (events, receiver) = yinyang_renderer::channel();
    let notifier = thread::Builder::new()
        .name("yinyang-events".into())
        .spawn(move || report_events(receiver))
        .context("failed to spawn event reporter")?;

    let result = Renderer::new(config).with_events(events).run();

    // The renderer has dropped its sender by now, which ends the reporter.
    notifier
        .join()
        .map_err(|err| anyhow!("event reporter panicked: {err:?}"))?;
    result
}

/// Surfaces renderer notifications until every sender is gone.
fn report_events(receiver: EventReceiver) {
    for event in receiver {
        match &event {
            RenderEvent::ShaderCompilerUnsupported => {
                tracing::warn!("runtime shader compilation unsupported");
            }
            RenderEvent::ShaderBuildFailed { .. } | RenderEvent::SurfaceFatal { .. } => {
                tracing::error!(?event, "renderer disabled");
            }
        }
        eprintln!("yinyang: {}", event.user_message());
    }
}
