use clap::Parser;
use mcsm_events::{EventKind, EventResult, Priority};
use mcsm_server::{Messager, ServerConfig};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "mcsm", version, about = "Answers Minecraft status and login requests")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config/mcsm.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;
    info!(
        "Config loaded: bind={}:{}, version={} ({:?}), protocol={}",
        config.bind,
        config.port,
        config.reported_version,
        config.family(),
        config.protocol_version
    );

    let mut messager = Messager::new(config)?;
    messager.events().on_any(Priority::Monitor, |event| {
        match event.kind() {
            EventKind::ClientConnected => info!("{}", event),
            EventKind::ClientPing => debug!("{}", event),
            EventKind::ClientError | EventKind::TransportError => warn!("{}", event),
            EventKind::Error => error!("{}", event),
            EventKind::Listen | EventKind::Close => {}
        }
        EventResult::Continue
    });

    messager.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    messager.stop().await;

    Ok(())
}
