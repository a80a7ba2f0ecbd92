//! Storefront - REST API server

use std::sync::Arc;

use anyhow::Result;
use axum::extract::Request;
use axum::ServiceExt;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::api::accounts::ensure_superuser;
use storefront::auth::JwtKeys;
use storefront::config::Config;
use storefront::publisher::EventPublisher;
use storefront::store::{memory::MemoryStore, postgres::PgStore, Store};
use storefront::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(&config, url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; data lives in memory and is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    if let Some((username, password)) = &config.superuser {
        let admin = ensure_superuser(store.as_ref(), username, password).await?;
        tracing::info!(user_id = admin.id, %username, "Superuser ready");
    }

    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    let state = AppState::new(store, JwtKeys::from_config(&config), events);
    let app = NormalizePathLayer::trim_trailing_slash().layer(router(state));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Storefront listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
    Ok(())
}
