//! lamco-display-topology - Display Topology Engine
//!
//! Entry point for the interactive binary. Reads commands from stdin and
//! prints display events as JSON lines on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamco_display_topology::config::{Config, LoggingConfig};
use lamco_display_topology::control::Controller;
use lamco_display_topology::display::DisplayManager;

/// Command-line arguments for lamco-display-topology
#[derive(Parser, Debug)]
#[command(name = "lamco-display-topology")]
#[command(version, about = "Display topology reconciliation engine", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Bootstrap displays, e.g. "1920x1080,1920+0-1280x1024"
    #[arg(short, long, env = "LAMCO_DISPLAYS")]
    pub displays: Option<String>,

    /// Allow the unified desktop mode
    #[arg(long)]
    pub unified: bool,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact), overrides the config file
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging settings may come from the file, so load it first and report later
    let loaded = match &args.config {
        Some(path) => Config::load(path).map_err(Some),
        None => Err(None),
    };
    let (config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default_config(), e),
    };
    let config = config.with_overrides(args.displays.clone(), args.unified);

    if args.dump_config {
        let toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        println!("{}", toml);
        return Ok(());
    }

    init_logging(&args, &config.logging)?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-display-topology v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    if let Some(e) = load_error {
        tracing::warn!("Failed to load config: {:#}, using defaults", e);
    }
    if let Err(e) = config.validate() {
        eprintln!("{}", lamco_display_topology::utils::format_user_error(&e));
        return Err(e);
    }
    info!("Configuration loaded successfully");
    tracing::debug!("Config: {:?}", config);

    let mut manager = DisplayManager::new(config.to_manager_options());
    config.restore_into(&mut manager);
    let mut controller = Controller::new(manager);

    if let Err(e) = controller
        .manager_mut()
        .init_from_spec(&config.display.host_window_bounds)
        .context("Failed to bootstrap displays")
    {
        eprintln!("{}", lamco_display_topology::utils::format_user_error(&e));
        return Err(e);
    }
    info!(
        "Started with {} active display(s)",
        controller.manager().num_displays()
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    if let Err(e) = controller.run(stdin, &mut stdout).await {
        eprintln!("{}", lamco_display_topology::utils::format_user_error(&e));
        return Err(e);
    }

    info!("Display engine shut down");
    Ok(())
}

fn init_logging(args: &Args, logging: &LoggingConfig) -> Result<()> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_display_topology={level},warn",
            level = log_level
        ))
    });

    let log_format = args.log_format.as_deref().unwrap_or(&logging.format);
    let log_file = args
        .log_file
        .as_ref()
        .map(std::path::PathBuf::from)
        .or_else(|| logging.log_file.clone());

    // stdout carries the event stream, so logs go to stderr
    if let Some(log_file_path) = &log_file {
        let file = File::create(log_file_path)
            .with_context(|| format!("Failed to create log file: {}", log_file_path.display()))?;

        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path.display());
    } else {
        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
        }
    }

    Ok(())
}
