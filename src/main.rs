use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{error, info, warn};
use std::{fs::OpenOptions, io::Write};
use tokio::sync::broadcast;
use wifi_ip_switcher::{
    config::{AppConfig, LogConfig},
    netsh_client::NetshClient,
    services::reconciliation::ReconciliationLoop,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // the logger depends on the configuration, report these two directly
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = initialize(&config.log) {
        eprintln!("failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<()> {
    if !config.monitor.profiles_file.try_exists().unwrap_or(false) {
        warn!(
            "no profiles file at {:?} yet, every network falls back to dhcp; add profiles with set-profile",
            config.monitor.profiles_file
        );
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let reconciler = ReconciliationLoop::new(
        NetshClient::new(config.netsh.command_timeout),
        config.monitor,
    );
    let monitor = tokio::spawn(reconciler.run(shutdown_rx));

    shutdown_signal().await?;

    // the loop finishes its current tick before it stops
    let _ = shutdown_tx.send(());
    monitor.await.context("monitor task panicked")?;

    info!("shutdown complete");

    Ok(())
}

fn initialize(config: &LogConfig) -> Result<()> {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context(format!("failed to open log file {path:?}"))?;

            builder.format(|f, record| {
                let timestamp = f.timestamp_seconds();
                writeln!(f, "{timestamp} - {} - {}", record.level(), record.args())
            });
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.format(|f, record| match record.level() {
                log::Level::Error => {
                    eprintln!("{}", record.args());
                    Ok(())
                }
                _ => {
                    writeln!(f, "{}", record.args())
                }
            });
            builder.target(Target::Stdout);
        }
    }

    builder.init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c")?,
        _ = sigterm.recv() => {},
    }

    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}
