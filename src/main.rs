mod app;
mod config;
mod domain;
mod drive_client;
mod reader_api;
mod session;
mod storage;
mod sync;
#[cfg(test)]
mod testing;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use app::AppContext;
use config::Config;
use migration::MigratorTrait;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use sea_orm::Database;
use storage::{KeyValueStore, MemoryKvStore, SqliteKvStore};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type DriveReadResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> DriveReadResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for noisy deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting DriveRead");

    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let kv = open_store(&config.db_connection_string).await;
    let ctx = Arc::new(AppContext::new(config, kv));

    match ctx.config.drive_access_token.clone() {
        Some(token) => {
            let outcome = ctx.sign_in(&token).await?;
            tracing::info!(entries = outcome.progress.len(), remote_used = outcome.remote_used, "initial sync with Drive");
        }
        None => {
            let outcome = ctx.sync().await;
            tracing::info!(entries = outcome.progress.len(), "loaded local progress; waiting for sign-in");
        }
    }

    run_poem(ctx.clone()).await?;

    // the server is gone; persist whatever is still waiting in the debounce window
    ctx.session.close().await;
    tracing::info!("shut down");
    Ok(())
}

/// SQLite-backed storage, or process memory when the database is unusable.
async fn open_store(connection_string: &str) -> Arc<dyn KeyValueStore> {
    match connect_db(connection_string).await {
        Ok(db) => Arc::new(SqliteKvStore::new(db)),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "local storage unavailable; progress is kept in memory only");
            Arc::new(MemoryKvStore::new())
        }
    }
}

async fn connect_db(connection_string: &str) -> DriveReadResult<sea_orm::DatabaseConnection> {
    let db_conn = Database::connect(connection_string)
        .await
        .with_context(|| "Failed to connect to database")?;
    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;
    Ok(db_conn)
}

pub async fn run_poem(ctx: Arc<AppContext>) -> DriveReadResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let bind_addr = ctx.config.bind_addr.clone();
    let api = reader_api::ReaderApi { ctx };
    let api_service = OpenApiService::new(api, "DriveRead API", version)
        .server(format!("http://{}", bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr))
        .run_with_graceful_shutdown(
            route,
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            },
            Some(Duration::from_secs(5)),
        )
        .await?;
    Ok(())
}
