use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use statsadmin_backend::api::{self, AppState};
use statsadmin_backend::config::Config;
use statsadmin_backend::db::Database;
use statsadmin_backend::import::NamePattern;
use statsadmin_backend::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    metrics::register_metrics();

    let name_pattern =
        NamePattern::new(&config.bot_name_keyword).expect("Invalid bot name keyword");
    let state = AppState {
        db: Arc::new(db),
        upload_dir: config.upload_dir.clone(),
        name_pattern,
    };

    let app = api::router(state, config.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        "Stats admin backend listening on {addr}"
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
