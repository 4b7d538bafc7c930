use api::routes::routes;
use api::scheduler::{spawn_dispatch_loop, spawn_settings_loop};
use api::state::AppState;
use axum::Router;
use db::connect;
use migration::{Migrator, MigratorTrait};
use services::Engine;
use services::client::HttpSimilarityClient;
use services::notifier::LogNotifier;
use services::storage::ContentStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;
use util::config::{AppConfig, PluginConfig};

#[tokio::main]
async fn main() {
    let app_config = AppConfig::global().clone();

    // Load configuration and initialize logging
    let _log_guard = init_logging(&app_config.log_file, &app_config.log_level);

    let plugin_config = PluginConfig::from_env().expect("Invalid similarity service configuration");

    // Set up dependencies
    let db = connect().await.expect("Failed to connect to database");
    Migrator::up(&db, None).await.expect("Failed to run migrations");

    let client =
        HttpSimilarityClient::new(&plugin_config).expect("Failed to build similarity client");
    let engine = Engine::new(
        db,
        Arc::new(client),
        Arc::new(LogNotifier),
        ContentStore::new(&app_config.storage_root),
        plugin_config,
    );
    let app_state = AppState::new(engine);

    // Background loops calling the idempotent entry points
    spawn_dispatch_loop(
        app_state.clone(),
        Duration::from_secs(app_config.dispatch_interval_seconds.max(1)),
    );
    spawn_settings_loop(
        app_state.clone(),
        Duration::from_secs(app_config.settings_refresh_interval_seconds.max(1)),
    );

    // Build app router
    let app = Router::new()
        .nest("/api", routes(app_state))
        .layer(CorsLayer::very_permissive());

    // Start server
    let addr: SocketAddr = format!("{}:{}", app_config.host, app_config.port)
        .parse()
        .expect("Invalid address");

    tracing::info!(
        "Starting {} on http://{}:{}",
        app_config.project_name,
        app_config.host,
        app_config.port
    );

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Server crashed");
}

fn init_logging(log_file: &str, log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| EnvFilter::new("api=info,services=info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if AppConfig::global().log_to_stdout {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}
