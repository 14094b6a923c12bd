use std::sync::Arc;

use anyhow::Context;
use jarvis_server::{ServerConfig, Settings, build_engine, run_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    info!(
        model = %settings.ollama_model,
        embedding_backend = %settings.embedding_backend,
        vector_backend = %settings.vector_backend,
        index = %settings.index_name,
        "starting jarvis"
    );

    let engine = Arc::new(build_engine(&settings).await?);
    let health = engine.check_health().await;
    if !health.llm {
        warn!(url = %settings.ollama_base_url, "generation backend is not reachable yet");
    }

    run_server(ServerConfig { host: settings.host.clone(), port: settings.port }, engine).await
}
