use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use sprintspeed::api::{build_router, AppState};
use sprintspeed::config::Config;
use sprintspeed::context::{ContextBudgeter, TiktokenAccountant};
use sprintspeed::conversation::MemoryConversationStore;
use sprintspeed::generation::ProviderRouter;
use sprintspeed::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging)?;

    let registry = Arc::new(config.registry().context("building model registry")?);
    let accountant = Arc::new(TiktokenAccountant::new().context("loading tokenizer")?);
    let budgeter = Arc::new(ContextBudgeter::new(registry.clone(), accountant, config.budget.clone()));

    let router = ProviderRouter::from_config(&config.providers, &config.generation)
        .context("building provider clients")?;
    let store = Arc::new(MemoryConversationStore::new(&config.conversation));

    let state = AppState::new(
        budgeter,
        Arc::new(router),
        store,
        config.generation.default_temperature,
    );
    let app = build_router(state, &config.server);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;

    info!(
        address = %address,
        models = registry.len(),
        default_model = %registry.default_model().name,
        "SprintSpeed listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("SprintSpeed stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
