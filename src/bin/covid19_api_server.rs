//! COVID-19 API HTTP Server
//!
//! Serves the engine's read routes as JSON over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, ServiceExt};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use covid19_api::routes::{api_prefix, index_document, normalize_base_path};
use covid19_api::{
    EngineConfig, EngineError, EngineResponse, Request, SnapshotName, SnapshotReloader,
    StatsEngine,
};

/// Server configuration
#[derive(Debug, Parser)]
#[command(name = "covid19-api-server", version, about = "COVID-19 statistics API server")]
struct Cli {
    /// Address to bind to
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    addr: SocketAddr,

    /// Directory holding the snapshot files
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Prefix for every route, e.g. `/covid`
    #[arg(long, env = "BASE_PATH", default_value = "")]
    base_path: String,

    /// Seconds a computed response is served from the cache
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 900)]
    cache_ttl_secs: u64,

    /// Maximum cached responses (unbounded when unset)
    #[arg(long, env = "CACHE_CAPACITY")]
    cache_capacity: Option<usize>,

    /// Seconds between snapshot refreshes
    #[arg(long, env = "RELOAD_INTERVAL_SECS", default_value_t = 60)]
    reload_interval_secs: u64,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.data_dir)
            .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .reload_interval(Duration::from_secs(self.reload_interval_secs));
        if let Some(capacity) = self.cache_capacity {
            config = config.cache_capacity(capacity);
        }
        config
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<StatsEngine>,
    index: Arc<Value>,
}

fn router(state: AppState, base_path: &str) -> Router {
    let base = normalize_base_path(base_path);
    let prefix = api_prefix(&base);
    let root = if base.is_empty() { "/".to_string() } else { base.clone() };

    Router::new()
        .route(&root, get(index))
        .route(&format!("{base}/api"), get(index))
        .route(&prefix, get(index))
        .route(&format!("{prefix}/all"), get(all))
        .route(&format!("{prefix}/all/:country"), get(all_country))
        .route(&format!("{prefix}/history/:data_type"), get(history))
        .route(&format!("{prefix}/history/:data_type/total"), get(history_total))
        .route(&format!("{prefix}/history/:data_type/:country"), get(history_country))
        .route(
            &format!("{prefix}/history/:data_type/:country/regions"),
            get(history_regions),
        )
        .route(
            &format!("{prefix}/history/:data_type/:country/:region"),
            get(history_region),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Trailing slashes are not significant.
fn service(state: AppState, base_path: &str) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state, base_path))
}

async fn index(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, &state.index)
}

async fn not_found() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        &json!({"error": "NotFound : The requested URL was not found on the server."}),
    )
}

async fn all(State(state): State<AppState>) -> Response {
    execute(&state, Request::All).await
}

async fn all_country(State(state): State<AppState>, Path(country): Path<String>) -> Response {
    execute(&state, Request::AllCountry { country }).await
}

async fn history(State(state): State<AppState>, Path(data_type): Path<String>) -> Response {
    execute(&state, Request::History { data_type }).await
}

async fn history_total(State(state): State<AppState>, Path(data_type): Path<String>) -> Response {
    execute(&state, Request::HistoryTotal { data_type }).await
}

async fn history_country(
    State(state): State<AppState>,
    Path((data_type, country)): Path<(String, String)>,
) -> Response {
    execute(&state, Request::HistoryCountry { data_type, country }).await
}

async fn history_regions(
    State(state): State<AppState>,
    Path((data_type, country)): Path<(String, String)>,
) -> Response {
    execute(&state, Request::HistoryRegions { data_type, country }).await
}

async fn history_region(
    State(state): State<AppState>,
    Path((data_type, country, region)): Path<(String, String, String)>,
) -> Response {
    execute(
        &state,
        Request::HistoryRegion {
            data_type,
            country,
            region,
        },
    )
    .await
}

async fn execute(state: &AppState, request: Request) -> Response {
    let engine = Arc::clone(&state.engine);
    let operation = request.clone();
    // A cold snapshot is read from disk on first use.
    let response = match tokio::task::spawn_blocking(move || engine.handle(&request)).await {
        Ok(response) => response,
        Err(err) => EngineResponse::from_outcome(
            &operation,
            Err(EngineError::unexpected(format!("request task failed: {err}"))),
        ),
    };
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &response.body)
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("covid19_api=info,covid19_api_server=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "unable to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = cli.engine_config();
    config.validate()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "starting covid19-api"
    );

    let engine = Arc::new(StatsEngine::from_config(&config));
    for (name, err) in engine.store().preload(&SnapshotName::all()) {
        warn!(snapshot = %name, error = %err, "snapshot unavailable at startup");
    }
    let reloader = SnapshotReloader::spawn(Arc::clone(&engine), config.reload_interval)?;

    let state = AppState {
        engine,
        index: Arc::new(index_document(&cli.base_path)),
    };
    let app = service(state, &cli.base_path);

    let listener = TcpListener::bind(cli.addr).await?;
    info!(address = %cli.addr, base_path = %normalize_base_path(&cli.base_path), "listening");

    axum::serve(listener, ServiceExt::<axum::extract::Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reloader.shutdown();
    info!("shut down");
    Ok(())
}
