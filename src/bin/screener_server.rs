use std::sync::Arc;

use screener::{
    init_logging, log_app_bind, log_app_start, log_source_selected, logging_config_from_env,
    screener_router, server_config_from_env, Dataset, InMemorySnapshotSource, PortfolioStore,
    RecordSnapshotSource, ScreenerAppState, ServerConfig,
};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let server_cfg = server_config_from_env();
    log_app_start(&logging_cfg, &server_cfg);

    let source = source_from_config(&server_cfg)?;
    let portfolios = Arc::new(PortfolioStore::new(server_cfg.portfolio_path.clone()));
    let state = ScreenerAppState::new(source, portfolios)
        .with_default_page_size(server_cfg.default_page_size);
    let app = screener_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(server_cfg.addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn source_from_config(
    cfg: &ServerConfig,
) -> Result<Arc<dyn RecordSnapshotSource>, Box<dyn std::error::Error>> {
    let (name, reason, source) = match (&cfg.data_path, cfg.force_demo) {
        (Some(path), false) => (
            "json_file",
            None,
            InMemorySnapshotSource::from_json_file(path)?,
        ),
        (Some(_), true) => ("demo", Some("SCREENER_USE_DEMO"), InMemorySnapshotSource::demo()),
        (None, _) => ("demo", Some("no_data_path"), InMemorySnapshotSource::demo()),
    };

    let counts = (
        source.snapshot(Dataset::Stocks).len(),
        source.snapshot(Dataset::Experts).len(),
    );
    log_source_selected(name, reason, counts);

    Ok(Arc::new(source))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(component = "screener_server", event = "app.shutdown"),
        // Without a signal handler the server runs until killed.
        Err(_) => std::future::pending::<()>().await,
    }
}
