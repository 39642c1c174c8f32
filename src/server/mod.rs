use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
};

use crate::catalog::StudyCatalog;
use crate::config::ServerConfig;
use crate::extraction::ExtractionEngine;

pub mod csv_output;
pub mod db_client;
pub mod handlers;
pub mod models;

/// Maximum accepted request body size (extraction requests are small)
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    pub catalog: Arc<StudyCatalog>,
    pub engine: Arc<ExtractionEngine>,
    pub config: ServerConfig,
}

pub async fn run() {
    dotenv().ok();

    // Load server configuration from environment variables
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    run_with_config(config).await;
}

pub async fn run_with_config(config: ServerConfig) {
    dotenv().ok();

    log::info!(
        "Server configuration: http={}:{}, catalog_dir={}, max_row_limit={}",
        config.http_host,
        config.http_port,
        config.catalog_dir,
        config.max_row_limit
    );

    // The catalog is the source of truth for what is servable; failing to
    // read the registry means nothing can be served at all.
    let catalog = match StudyCatalog::load(Path::new(&config.catalog_dir)) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            log::error!("Failed to load study catalog: {}", e);
            log::error!("  Server cannot start without a readable catalog.");
            std::process::exit(1);
        }
    };

    let client = match db_client::try_get_client() {
        Some(client) => {
            log::info!("ClickHouse client created successfully");
            client
        }
        None => {
            // Catalog browsing still works without a database; extraction
            // requests will fail per-table and surface in tables_skipped.
            log::warn!(
                "No ClickHouse configuration found (CLICKHOUSE_URL/USER/PASSWORD). \
                 Extraction queries will fail until the database is reachable."
            );
            clickhouse::Client::default().with_url("http://localhost:8123")
        }
    };

    let source = Arc::new(db_client::ClickhouseSource::new(client));
    let engine = Arc::new(ExtractionEngine::new(catalog.clone(), source, &config));

    let app_state = AppState {
        catalog,
        engine,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/studies", get(handlers::list_studies_handler))
        .route("/studies/{study}/tables", get(handlers::list_tables_handler))
        .route(
            "/studies/{study}/tables/{table}/columns",
            get(handlers::table_columns_handler),
        )
        .route("/extract", post(handlers::extract_handler))
        .route("/data", post(handlers::data_handler))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(app_state));

    let http_bind_address = format!("{}:{}", config.http_host, config.http_port);
    log::info!("Starting HTTP server on {}", http_bind_address);

    let http_listener = match TcpListener::bind(&http_bind_address).await {
        Ok(listener) => {
            println!("✓ Successfully bound HTTP listener to {}", http_bind_address);
            listener
        }
        Err(e) => {
            log::error!(
                "Failed to bind HTTP listener to {}: {}",
                http_bind_address,
                e
            );
            log::error!("  Is another process using port {}?", config.http_port);
            std::process::exit(1);
        }
    };

    let http_server = axum::serve(http_listener, app);

    println!("StudyBridge server is running");
    println!("  HTTP API: http://{}", http_bind_address);

    if config.daemon {
        println!("Running in daemon mode - press Ctrl+C to stop");

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let sigterm = signal(SignalKind::terminate());
            let sigint = signal(SignalKind::interrupt());
            match (sigterm, sigint) {
                (Ok(mut sigterm), Ok(mut sigint)) => {
                    tokio::select! {
                        result = http_server => {
                            if let Err(e) = result {
                                log::error!("HTTP server error: {:?}", e);
                            }
                        }
                        _ = sigterm.recv() => println!("Received SIGTERM, shutting down..."),
                        _ = sigint.recv() => println!("Received SIGINT, shutting down..."),
                    }
                }
                _ => {
                    log::error!(
                        "Failed to register signal handlers. Server will run without graceful shutdown."
                    );
                    if let Err(e) = http_server.await {
                        log::error!("HTTP server error: {:?}", e);
                    }
                }
            }
        }

        #[cfg(windows)]
        {
            tokio::select! {
                result = http_server => {
                    if let Err(e) = result {
                        log::error!("HTTP server error: {:?}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Received shutdown signal, shutting down...");
                }
            }
        }

        println!("Server stopped");
    } else {
        // Run HTTP server (this will block until shutdown)
        if let Err(e) = http_server.await {
            log::error!("HTTP server fatal error: {:?}", e);
            std::process::exit(1);
        }
    }
}
