//! Ocular Disease Classification API Server
//!
//! REST API exposing the pretrained fundus image classifier.

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use inference_engine::{ModelHolder, ModelLoader};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

pub mod error;
pub mod routes;
pub mod schemas;
pub mod settings;

pub use error::ApiError;
pub use settings::{ConfigError, LogFormat, Settings};

/// Rotated log files kept on disk
const MAX_LOG_FILES: usize = 10;

/// Application state shared across handlers
pub struct AppState {
    /// Validated settings
    pub settings: Arc<Settings>,
    /// Lazily loaded classifier
    pub model: ModelHolder,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state with the tract ONNX loader
    pub fn new(settings: Arc<Settings>) -> Self {
        let model = ModelHolder::new(settings.engine_config());
        Self {
            settings,
            model,
            metrics: None,
        }
    }

    /// Create state with a custom model loader
    pub fn with_loader(settings: Arc<Settings>, loader: Arc<dyn ModelLoader>) -> Self {
        let model = ModelHolder::with_loader(settings.engine_config(), loader);
        Self {
            settings,
            model,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/health",
            get(routes::health::health).fallback(routes::method_not_allowed),
        )
        .route(
            "/predict",
            post(routes::predict::predict).fallback(routes::method_not_allowed),
        );

    Router::new()
        .nest("/api", api)
        .route(
            "/metrics",
            get(routes::prometheus::render).fallback(routes::method_not_allowed),
        )
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(state.settings.max_request_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging to stdout and, when configured, a rotating log file.
///
/// Files rotate daily as `LOG_DIR/app.YYYY-MM-DD.log`; the newest 10 are kept.
///
/// The returned guard flushes the file writer and must live until shutdown.
pub fn init_logging(settings: &Settings) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_writer, guard) = match &settings.log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("app")
                .filename_suffix("log")
                .max_log_files(MAX_LOG_FILES)
                .build(dir)
                .with_context(|| format!("failed to open log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(LevelFilter::from_level(settings.log_level));

    match settings.log_format {
        LogFormat::Text => {
            let file_layer = file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w));
            registry
                .with(fmt::layer().with_target(true))
                .with(file_layer)
                .try_init()
        }
        LogFormat::Json => {
            let file_layer = file_writer.map(|w| fmt::layer().json().with_writer(w));
            registry
                .with(fmt::layer().json().with_target(true))
                .with(file_layer)
                .try_init()
        }
    }
    .context("failed to set tracing subscriber")?;

    Ok(guard)
}

/// Run the server until Ctrl-C
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let settings = Arc::new(settings);
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let state = Arc::new(AppState::new(Arc::clone(&settings)).with_metrics(metrics));
    let app = create_router(state);

    let addr = settings.bind_addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Application startup");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Application shutdown");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
