use tracing::{error, info};

mod app;
mod ops_loop;
mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load config: explicit path > TCA_CONFIG env > ~/.tca/tca.toml
    let config_path = std::env::var("TCA_CONFIG").ok();
    let config = tca_core::config::TcaConfig::load(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tca_app={level},tca_storage={level},tca_ingest={level}", level = config.log_level.as_filter_str()).into()),
        )
        .init();

    info!(store_path = %config.store.path, mode = ?config.mode, "starting tca-app");

    let state = app::AppState::bootstrap(config).await?;
    let (scheduler, worker, ops) = app::spawn_background_work(&state);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
    }
    info!("shutdown signal received");

    let report = shutdown::execute_shutdown(&state, scheduler, worker, ops).await;
    info!("{report}");

    Ok(())
}
