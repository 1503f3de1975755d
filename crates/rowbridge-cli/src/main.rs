//! rowbridge - rowing monitor peripheral bridge

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::info;

use rowbridge_cli::{app::BridgeApp, cli::Cli, cli::Commands, config::AppConfig, replay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration, flags win over the file
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_overrides(&cli);
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Run {
            replay,
            fast,
            workout_plan,
        } => run(config, replay.as_deref(), !fast, workout_plan.as_deref()).await,
    }
}

async fn run(
    config: AppConfig,
    recording: Option<&Path>,
    realtime: bool,
    workout_plan: Option<&Path>,
) -> anyhow::Result<()> {
    let app = BridgeApp::start(config).await.context("starting peripherals")?;

    if let Some(path) = workout_plan {
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading workout plan {}", path.display()))?;
        app.submit_workout_plan(payload).await?;
    }

    let outcome = match recording {
        Some(path) => replay_file(&app, path, realtime).await,
        None => {
            info!("Peripherals running, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")
        }
    };

    app.shutdown().await;
    outcome
}

async fn replay_file(app: &BridgeApp, path: &Path, realtime: bool) -> anyhow::Result<()> {
    let file = File::open(path)
        .await
        .with_context(|| format!("opening recording {}", path.display()))?;
    tokio::select! {
        delivered = replay::replay(BufReader::new(file), app.manager(), realtime) => {
            delivered.with_context(|| format!("replaying {}", path.display()))?;
        }
        _ = tokio::signal::ctrl_c() => info!("Replay interrupted"),
    }
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
