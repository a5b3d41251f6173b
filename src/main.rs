use nlnetstat::config::{self, Settings};
use nlnetstat::orchestrator::OrchestratorHandle;
use nlnetstat::state::SharedState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    let switches = config::load_switches(&settings.config_dir)?;
    let devices = config::load_devices(&settings.config_dir)?;

    tracing::info!(
        switches = switches.len(),
        devices = devices.len(),
        poll_interval_secs = settings.poll_interval_secs,
        "nlnetstat starting"
    );

    let shared = SharedState::new();
    let orchestrator = OrchestratorHandle::new(&settings, switches, devices, shared.clone());

    let addr_str = format!("{}:{}", settings.api_host, settings.api_port);
    let bind_addr: std::net::SocketAddr = addr_str
        .parse()
        .map_err(|err| nlnetstat::error::NlnsError::InvalidBindAddr(addr_str.clone(), err))?;

    let app = nlnetstat::api::router(shared, orchestrator.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tokio::select! {
        _ = orchestrator.run() => {},
        result = axum::serve(listener, app) => { result?; },
    }

    Ok(())
}
