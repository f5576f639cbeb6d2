use std::sync::Arc;

use bulk_consume::{
    config::Config,
    dispatcher::DispatcherState,
    router::router,
    search_probe::tantivy_backed::TantivyThinSearch,
};
use clap::Parser;
use cmd_util::env::config_service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = config_service();
    let config = Config::parse();
    tracing::info!(?config, "starting bulk consume backend");

    std::fs::create_dir_all(&config.index_dir)?;
    let index = Arc::new(TantivyThinSearch::open_or_create(std::path::Path::new(&config.index_dir))?);

    let state = DispatcherState::new(index.clone(), index.clone(), index);
    let app = router(state);

    let (host, port) = config.bind_address();
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(%port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
