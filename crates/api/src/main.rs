use std::sync::Arc;

use anyhow::Context;

use staybook_api::app::{self, AppState};
use staybook_api::config::ApiConfig;
use staybook_auth::GrantStore;
use staybook_infra::grant_store::{InMemoryGrantStore, PgGrantStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    staybook_observability::init();

    let config = ApiConfig::from_env()?;

    let store: Arc<dyn GrantStore> = match &config.database_url {
        Some(url) => {
            let pg = PgGrantStore::connect(url).await?;
            pg.migrate().await.context("failed to apply grant schema")?;
            Arc::new(pg)
        }
        None => Arc::new(InMemoryGrantStore::new()),
    };

    let state = AppState::new(store, config.cache_ttl);
    if let Some(period) = config.cache_sweep {
        app::spawn_cache_sweeper(state.cache.clone(), period);
    }

    let app = app::build_app(&config.jwt_secret, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        cache_ttl_secs = config.cache_ttl.num_seconds(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
