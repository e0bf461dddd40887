use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

use request_governor::args::{Args, Command};
use request_governor::{
    Config, Governance, MaintenanceScheduler, apply_env_overrides, control, create_default_config,
    init_logging, load_config,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_dir.as_deref());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_or_create_config(&args.config)?;
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    match args.command() {
        Command::Serve => serve(config).await,
        Command::Summary => summary(config).await,
        Command::Rebuild => rebuild(config).await,
        Command::Export { output } => export(config, output.as_deref()).await,
    }
}

/// Load the config file, writing a default one first if it does not exist
fn load_or_create_config(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path).inspect_err(|e| {
            error!("Failed to load existing config file '{}': {}", path.display(), e);
            error!("Please check your config file syntax and try again");
        });
    }

    warn!(
        "Config file '{}' not found, creating default config",
        path.display()
    );
    let mut config = create_default_config();
    let config_toml = toml::to_string_pretty(&config)?;
    std::fs::write(path, &config_toml)
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;
    info!("Created default config file: {}", path.display());

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Governance over the persisted state, for the one-shot subcommands
async fn load_persisted(config: Config) -> Result<Governance> {
    let Some(dir) = config.storage.data_dir.clone() else {
        bail!("No data directory configured; set storage.data_dir or pass --data-dir");
    };
    let governance = Governance::new(config);
    let report = governance.load().await;
    if !report.is_clean() {
        for e in &report.errors {
            warn!("Unreadable collection in {}: {}", dir.display(), e);
        }
    }
    Ok(governance)
}

async fn serve(config: Config) -> Result<()> {
    info!(
        enabled = config.enabled,
        data_dir = ?config.storage.data_dir,
        "Starting request governor"
    );

    let governance = Governance::new(config);
    let report = governance.load().await;
    if !report.is_clean() {
        warn!(
            failed = report.errors.len(),
            "Some collections could not be loaded and start empty"
        );
    }

    let scheduler = MaintenanceScheduler::new(governance.clone()).spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let response = control::handle_line(&governance, &line);
                    let mut out = serde_json::to_vec(&response)?;
                    out.push(b'\n');
                    stdout.write_all(&out).await?;
                    stdout.flush().await?;
                }
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    governance.shutdown().await;
    info!("Graceful shutdown complete");
    Ok(())
}

async fn summary(config: Config) -> Result<()> {
    let governance = load_persisted(config).await?;
    let summary = governance.global_summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn rebuild(config: Config) -> Result<()> {
    let governance = load_persisted(config).await?;
    let report = governance.store().rebuild();
    governance
        .persist()
        .await
        .context("Failed to save rebuilt aggregates")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn export(config: Config, output: Option<&Path>) -> Result<()> {
    let governance = load_persisted(config).await?;
    let snapshot = serde_json::to_vec_pretty(&governance.export())?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &snapshot)
                .await
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            info!("Exported snapshot to {}", path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&snapshot).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
