pub mod types;
pub mod config;
pub mod error;
pub mod bracket;
pub mod tournament;
pub mod records;
pub mod store;
pub mod record_commands;

use types::*;
use config::*;
use records::RecordBook;
use record_commands::*;
use store::{build_store, StoreWriter};

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ── HTTP server ────────────────────────────────────────────────────────

pub fn router(state: ServerState, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/tournaments", get(list_tournaments).post(create_tournament))
        .route("/api/tournaments/:id", get(get_tournament).delete(delete_tournament))
        .route("/api/tournaments/:id/settings", put(update_settings))
        .route("/api/tournaments/:id/teams", post(add_team))
        .route("/api/tournaments/:id/teams/:name", put(rename_team).delete(remove_team))
        .route("/api/tournaments/:id/build", post(build_bracket).delete(clear_bracket))
        .route("/api/tournaments/:id/matches/:match_id/score", put(record_score))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn start_server(book: SharedRecordBook, store: SharedStore, static_dir: PathBuf, addr: &str) {
    let state = ServerState { book, writer: StoreWriter::spawn(store) };
    let app = router(state, static_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("records server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("records server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("records server error: {e}");
    }
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();
    let (config, config_err) = match load_config_inner() {
        Ok(config) => (config, None),
        Err(e) => (apply_env_defaults(AppConfig::default()), Some(e)),
    };

    // Initialize tracing with a daily log file under the data dir
    let logs_dir = logs_dir(&config);
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "records.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("PE class records starting");
    if let Some(e) = config_err {
        warn!("{e}; falling back to defaults");
    }
    log_env_warnings(&config);

    // Built before the runtime so the blocking HTTP client never lives on an async thread
    let store = build_store(&config);
    let tournaments = match store.load_all() {
        Ok(list) => list,
        Err(e) => {
            error!("loading tournaments from {} store failed: {e}", store.name());
            Vec::new()
        }
    };
    info!("loaded {} tournaments from {} store", tournaments.len(), store.name());

    let book: SharedRecordBook = Arc::new(Mutex::new(RecordBook::from_tournaments(tournaments)));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };
    runtime.block_on(start_server(book, store.clone(), static_dir(&config), &config.http_addr));
    drop(runtime);
    drop(store);
}
