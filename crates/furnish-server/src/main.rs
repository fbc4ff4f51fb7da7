mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use furnish_api::accounts::Registration;
use furnish_api::cache::PageCache;
use furnish_api::tokens::TokenIssuer;
use furnish_api::{AppStateInner, router};
use furnish_db::Database;
use tracing::{info, warn};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "furnish=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let tokens = Arc::new(TokenIssuer::new(
        &config.jwt_secret,
        chrono::Duration::minutes(config.access_ttl_minutes),
        chrono::Duration::days(config.refresh_ttl_days),
    ));
    let state = AppStateInner::new(db, tokens, PageCache::new(config.page_cache_capacity));

    if let Some(admin) = config.admin {
        let bootstrap = state.clone();
        let user = tokio::task::spawn_blocking(move || {
            bootstrap.accounts.ensure_admin(Registration {
                email: admin.email,
                password: admin.password,
                first_name: "Store".into(),
                last_name: "Admin".into(),
                phone: None,
            })
        })
        .await?
        .map_err(|e| anyhow::anyhow!("Admin bootstrap failed: {}", e))?;
        info!("Admin account ready: {}", user.email);
    } else {
        warn!("No FURNISH_ADMIN_EMAIL configured; catalog writes need an existing admin");
    }

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Furnish server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
