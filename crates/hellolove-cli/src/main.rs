use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod repl;

use hellolove_bus::EventBus;
use hellolove_core::*;
use repl::run_repl;

#[derive(Parser)]
#[command(name = "hellolove", version, about = "hello love personal assistant chat")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.hellolove/hellolove.yaml",
        help = "Path to the YAML config file"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Line-based chat REPL")]
    Chat,
    #[command(about = "Full-screen terminal chat with task and settings panels")]
    Tui,
    #[command(about = "Validate the config file")]
    Validate,
    #[command(about = "Write a default config file")]
    Init {
        #[arg(long, help = "Overwrite an existing config file")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Init { force } => {
            write_default_config(&config_path, force)?;
            println!("Wrote default config to {}", config_path.display());
        }
        Commands::Validate => {
            let config = load_config(&config_path)?;
            validate_config(&config)?;
            println!(
                "Config valid. assistant {}, reply delay {} ms, bus capacity {}.",
                config.assistant.assistant_name,
                config.session.response_delay_ms,
                config.bus.capacity
            );
        }
        Commands::Chat => {
            let config = load_config(&config_path)?;
            let _guard = init_logging(&config, &config_path, true)?;
            let (bus, session) = bootstrap(&config).await?;
            run_repl(session, &bus).await?;
        }
        Commands::Tui => {
            let config = load_config(&config_path)?;
            let _guard = init_logging(&config, &config_path, false)?;
            let (bus, session) = bootstrap(&config).await?;
            hellolove_tui::run_tui(session, &bus).await?;
        }
    }

    Ok(())
}

fn log_dir(config: &HelloLoveConfig, config_path: &Path) -> PathBuf {
    match &config.log.dir {
        Some(dir) => expand_home(dir),
        None => config_path
            .parent()
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs")),
    }
}

fn init_logging(
    config: &HelloLoveConfig,
    config_path: &Path,
    stderr: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = log_dir(config, config_path);
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "hellolove.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level));

    // The TUI owns the terminal, so only the REPL logs to stderr.
    let stderr_layer =
        stderr.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    Ok(guard)
}

async fn bootstrap(config: &HelloLoveConfig) -> Result<(EventBus, SessionController)> {
    validate_config(config)?;
    let bus = EventBus::new(config.bus.capacity);
    let session = SessionController::start(
        config.session_options(),
        CommandInterpreter::with_builtins(),
        bus.publisher(),
        Arc::new(UnavailableVoiceCapture),
        Arc::new(SilentSpeechOutput),
    )
    .await?;
    tracing::info!(
        assistant = %config.assistant.assistant_name,
        bus_capacity = config.bus.capacity,
        "bootstrap complete"
    );
    Ok((bus, session))
}
