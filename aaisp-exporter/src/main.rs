use aaisp_exporter::collector::{BroadbandCollector, ScrapeStatus};
use aaisp_exporter::config::{self, Cli, ExporterConfig};
use aaisp_exporter::logging;
use aaisp_exporter::server::{self, AppState};

use aaisp_chaos::Chaos;
use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ExporterConfig::load(Cli::parse())?;

    let _logging_guard = logging::init_logging(
        &config.log_level,
        config.log_output,
        config.log_dir.as_deref(),
    )?;

    let auth = match config::credentials_from_env() {
        Ok(auth) => auth,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    let chaos = Chaos::new(auth)
        .context("Failed to build CHAOS client")?
        .with_endpoint(&config.endpoint);
    tracing::debug!("Using CHAOS endpoint {}", chaos.endpoint());

    let collector = BroadbandCollector::new(Arc::new(chaos), Arc::new(ScrapeStatus::new()));
    let app = server::router(AppState::new(Arc::new(collector)));

    let address = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to listen on {}: {}", config.listen, e);
            return Err(e).with_context(|| format!("Failed to listen on {}", config.listen));
        }
    };

    tracing::info!("Listening on {}", config.listen);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
