use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idx_issuer::cli::{Cli, Commands};
use idx_issuer::clock::SystemClock;
use idx_issuer::config::{Config, LogFormat};
use idx_issuer::services::issuer_directory::DIRECTORY_REFRESH_INTERVAL;
use idx_issuer::{cli, create_app, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Config => {
            cli::handle_config_validate(&config)?;
            let report = startup::validate_environment(&config).await?;
            report.print();
            if !report.is_valid() {
                anyhow::bail!("startup validation failed");
            }
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if config.ideal.is_none() && config.idin.is_none() {
        tracing::warn!("neither iDEAL nor iDIN is enabled, only /health will be served");
    }

    let state = AppState::from_config(&config, Arc::new(SystemClock));

    for product in state.products() {
        tracing::info!("{} enabled at {}", product.name, product.prefix);
        product
            .directory
            .start(product.manager.bank(), DIRECTORY_REFRESH_INTERVAL);
        tokio::spawn(product.manager.sweeper().run(product.name));
    }

    let app = create_app(state, config.static_dir.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
