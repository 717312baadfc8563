//! Storefront API server binary.
//!
//! Reads configuration from the environment (and `.env`), runs migrations,
//! and serves the API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use storefront_api::AppState;
use storefront_api::config::ApiConfig;
use storefront_core::auth::sessions::run_sweeper;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI arguments for the API server. Flags override the environment.
#[derive(Parser, Debug)]
#[command(name = "storefront_server", about = "Storefront API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Serve from in-memory stores instead of PostgreSQL. Nothing survives a restart.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_api=debug,storefront_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }

    info!(
        bind_addr = %config.bind_addr,
        session_backend = %config.session_backend,
        allow_listed_admins = config.admin_ids.len(),
        "starting storefront_server"
    );

    let state = if args.in_memory {
        info!("using in-memory stores");
        AppState::in_memory(config.clone())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        storefront_api::migrate(&pool).await?;

        AppState::postgres(pool, config.clone())
    };

    let shutdown = CancellationToken::new();

    let sweeper = state.sessions.store().map(|store| {
        let every = Duration::from_secs(config.sweep_interval_secs.max(1));
        info!(interval_secs = every.as_secs(), "starting session sweeper");
        tokio::spawn(run_sweeper(Arc::clone(store), every, shutdown.clone()))
    });

    let app = storefront_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let signal = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            signal.cancel();
        })
        .await;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

    served?;
    Ok(())
}
