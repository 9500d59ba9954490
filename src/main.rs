use std::{sync::Arc, time::Duration};

use chrono::Utc;
use salvo::{listener::TcpListener, Server};
use tracing_subscriber::EnvFilter;

use places_backend::{
    config::env_var::EnvVar,
    domain::repository::TokenBlacklistRepository,
    error::BoxedError,
    infra::{context::AppContext, database::connection, router},
};

const BLACKLIST_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn spawn_blacklist_purge(ctx: Arc<AppContext>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(BLACKLIST_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match ctx.blacklist.purge_expired(Utc::now()).await {
                Ok(purged) => tracing::info!(purged, "expired blacklisted tokens purged"),
                Err(err) => tracing::error!("token blacklist purge failed: {err}"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("unable to listen for shutdown signal: {err}");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), BoxedError> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("places_backend=info,places_api=info,salvo=info")),
        )
        .init();

    let env = EnvVar::from_env()?;
    let pool = connection::create_sqlx_pool(&env).await?;
    connection::migrate(&pool).await?;

    let ctx = AppContext::new(pool, &env)?;
    spawn_blacklist_purge(ctx.clone());

    let address = format!("0.0.0.0:{}", env.port);
    tracing::info!("listening on {address}");
    let listener = TcpListener::bind(&address);
    Server::new(listener)
        .serve_with_graceful_shutdown(router::app(ctx, &env), shutdown_signal())
        .await;
    Ok(())
}
