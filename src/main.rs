use clap::Parser;
use mintdesk::{AppConfig, TradingDesk};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mintdesk", about = "Trading desk for auto-launched tokens")]
struct Args {
    /// Directory containing default.toml and environment overrides
    #[arg(long, default_value = "config")]
    config_dir: String,
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Missing endpoints are the only fatal startup failure
    let config = AppConfig::load_from(&args.config_dir)?;
    init_logging(&config);

    info!("Starting mintdesk (feed: {})", config.feed.ws_url);

    let mut desk = TradingDesk::from_config(&config);
    desk.start();

    wait_for_signal().await;
    info!("Shutdown signal received");

    desk.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
