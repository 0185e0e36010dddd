mod api;
mod page;

use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use wabridge_channels::{qr::DataUriEncoder, whatsapp::WhatsAppWebFactory};
use wabridge_core::config::{self, shellexpand, Config};
use wabridge_session::SessionManager;

#[derive(Parser)]
#[command(
    name = "wabridge",
    version,
    about = "HTTP bridge for a single WhatsApp Web session"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "WABRIDGE_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Start,
    /// Print the resolved configuration.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let _guard = init_logging(&cfg)?;
            if !Path::new(&cli.config).exists() {
                info!("config file not found at {}, using defaults", cli.config);
            }

            let factory = Arc::new(WhatsAppWebFactory::new(
                cfg.whatsapp.clone(),
                &cfg.wabridge.data_dir,
            ));
            let session = SessionManager::new(factory, Arc::new(DataUriEncoder), cfg.session.clone());

            info!("{} starting", cfg.wabridge.name);
            let state = api::ApiState::new(session.clone(), &cfg.api);
            api::serve(&cfg.api, state, shutdown_signal()).await?;

            session.close().await;
            info!("{} stopped", cfg.wabridge.name);
        }
        Commands::Status => {
            print_status(&cli.config, &cfg);
        }
    }

    Ok(())
}

/// Log to stdout and to a daily-rolling file under `{data_dir}/logs/`.
fn init_logging(cfg: &Config) -> anyhow::Result<WorkerGuard> {
    let log_dir = format!("{}/logs", shellexpand(&cfg.wabridge.data_dir));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "wabridge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.wabridge.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn print_status(config_path: &str, cfg: &Config) {
    let session_dir = format!(
        "{}/whatsapp_session",
        shellexpand(&cfg.wabridge.data_dir)
    );

    println!("wabridge status\n");
    println!("Config: {config_path}");
    println!("Listen: http://{}:{}", cfg.api.host, cfg.api.port);
    println!(
        "Auth: {}",
        if cfg.api.api_key.is_empty() {
            "disabled"
        } else {
            "bearer token"
        }
    );
    println!(
        "QR timeout: {}",
        match cfg.session.qr_timeout() {
            Some(t) => format!("{}s", t.as_secs()),
            None => "disabled".to_string(),
        }
    );
    println!(
        "Auto-reply (!ping): {}",
        if cfg.session.auto_reply { "on" } else { "off" }
    );
    println!(
        "WhatsApp key store: {session_dir} ({}, {})",
        if Path::new(&session_dir).exists() {
            "present"
        } else {
            "absent"
        },
        if cfg.whatsapp.fresh_session {
            "wiped on every initialize"
        } else {
            "reused"
        }
    );
}
