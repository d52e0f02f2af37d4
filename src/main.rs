//! 用户 CRUD 服务入口
//!
//! 同一个 `UserResource` 同时挂在 axum 和裸 hyper 两个端口上。

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use frameworks_crud::app::users::handler::create_routes;
use frameworks_crud::app::users::hyper_handler::{self, HyperRouter};
use frameworks_crud::config::{Config, StoreBackend};
use frameworks_crud::infrastructure::logger::Logger;
use frameworks_crud::{MemoryUserStore, UserResource, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = Logger::init(&config.logging)?;

    info!("Starting users server...");

    let store = build_store(&config).await?;
    let users = UserResource::new(store).with_store_timeout(config.database.query_timeout());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let axum_listener = TcpListener::bind(config.http.axum_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.http.axum_addr()))?;
    info!("🚀 axum transport running on http://{}", axum_listener.local_addr()?);

    let app = create_routes(users.clone(), config.http.request_timeout());
    let axum_server = async {
        axum::serve(axum_listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
            .await
            .context("axum transport failed")
    };

    let hyper_server = async {
        let Some(addr) = config.http.hyper_addr() else {
            info!("hyper transport disabled");
            return Ok(());
        };
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let router = HyperRouter::new(users.clone(), config.http.request_timeout())
            .context("invalid hyper route table")?;
        hyper_handler::serve(listener, Arc::new(router), wait_for_shutdown(shutdown_rx.clone()))
            .await
            .context("hyper transport failed")
    };

    info!("📖 Endpoints: GET/POST /users, GET/PUT/DELETE /users/:id");
    tokio::try_join!(axum_server, hyper_server)?;

    info!("users server stopped");
    Ok(())
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn UserStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store, data will not survive a restart");
            Ok(Arc::new(MemoryUserStore::new()))
        }
        StoreBackend::Postgres => postgres_store(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn postgres_store(config: &Config) -> anyhow::Result<Arc<dyn UserStore>> {
    use frameworks_crud::app::users::pg_store::PgUserStore;
    use frameworks_crud::infrastructure::database::DatabaseManager;

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to apply users schema")?;
    Ok(Arc::new(PgUserStore::new(db.get_pool().clone())))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_store(_config: &Config) -> anyhow::Result<Arc<dyn UserStore>> {
    anyhow::bail!("built without the `postgres` feature, set USERS_STORE=memory")
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
