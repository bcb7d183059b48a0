use crate::{
    config::{Config, Cors},
    errors::AppError,
    rpc::{
        manifest::{callback_url, ManifestCache, FUNCTIONS_PATH},
        registry::{CallRequest, FunctionRegistry},
        types::{CallResponse, Manifest},
    },
    security::{self, RateLimiters},
    telemetry,
    upstream::{BggClient, DynUpstream},
};
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::{
    any::Any,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

const RATE_LIMIT_PURGE_EVERY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub registry: Arc<FunctionRegistry>,
    pub upstream: DynUpstream,
    pub rls: RateLimiters,
    pub manifest: Arc<ManifestCache>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(cfg: Config, upstream: DynUpstream) -> Self {
        let metrics = cfg.metrics.enabled.then(telemetry::install);
        Self {
            rls: RateLimiters::from_limits(&cfg.limits),
            manifest: Arc::new(ManifestCache::new(Duration::from_secs(cfg.cache.manifest_ttl_s))),
            registry: Arc::new(FunctionRegistry::new()),
            cfg: Arc::new(cfg),
            upstream,
            metrics,
        }
    }
}

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let upstream = Arc::new(BggClient::new(&cfg).context("building upstream client")?);
    let shared = AppState::new(cfg, upstream);

    let rls = shared.rls.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(RATE_LIMIT_PURGE_EVERY);
        loop {
            tick.tick().await;
            rls.retain_recent();
        }
    });

    let bind = (shared.cfg.server.bind_addr.clone(), shared.cfg.server.port);
    let app = build_router(shared.clone());
    let listener = tokio::net::TcpListener::bind((bind.0.as_str(), bind.1))
        .await
        .with_context(|| format!("binding {}:{}", bind.0, bind.1))?;
    info!(addr = %listener.local_addr()?, functions = ?shared.registry.list_names(), "bgg-relay ready");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("bgg-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "ctrl-c", "shutting down"),
        _ = terminate => info!(signal = "SIGTERM", "shutting down"),
    }
}

pub fn build_router(shared: AppState) -> Router {
    let limit_bytes = shared.cfg.limits.max_request_kb * 1024;
    let functions = post(call)
        .layer(DefaultBodyLimit::max(limit_bytes))
        .layer(middleware::from_fn_with_state(shared.clone(), security::rate_limit));
    Router::new()
        .route("/health", get(health))
        .route("/manifest.json", get(manifest))
        .route(FUNCTIONS_PATH, functions)
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&shared.cfg.cors)),
        )
        .with_state(shared)
}

fn cors_layer(cors: &Cors) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    if cors.allowed_origins.is_empty() {
        return layer.allow_origin(AnyOrigin);
    }
    let origins: Vec<HeaderValue> = cors.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    AppError::Internal("unexpected error".into()).into_response()
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn manifest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let functions = state.manifest.descriptors(&state.registry);
    let body = Manifest {
        schema_version: "v1",
        name: "bgg-relay",
        display_name: "BoardGameGeek",
        description: "Search BoardGameGeek, look up game details, the hotness list and user collections.",
        version: env!("CARGO_PKG_VERSION"),
        callback_url: callback_url(&state.cfg, &headers),
        functions: &functions,
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::NotFound.into_response(),
    }
}

async fn call(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let client = security::client_key(&headers, peer.map(|c| c.0), state.cfg.server.trust_forwarded_for);

    let req = match security::content_length_ok(&headers, state.cfg.limits.max_request_kb)
        .and_then(|()| body.map_err(rejection_error))
    {
        Ok(Json(req)) => req,
        Err(e) => {
            audit_end(&request_id, &client, "-", "deny", e.code(), started.elapsed().as_millis() as u64, 0);
            return e.into_response();
        }
    };

    let name = req.function_call.name;
    // keep metric label cardinality bounded
    let label = if state.registry.get(&name).is_some() { name.as_str() } else { "unknown" };
    match state.registry.invoke(&*state.upstream, &name, req.arguments).await {
        Ok(result) => {
            let bytes_out = result.len() as u64;
            telemetry::function_call(label, "ok");
            audit_end(&request_id, &client, &name, "allow", "OK", started.elapsed().as_millis() as u64, bytes_out);
            (StatusCode::OK, Json(CallResponse { result })).into_response()
        }
        Err(e) => {
            telemetry::function_call(label, e.code());
            if e.status().is_server_error() {
                tracing::warn!(request_id = %request_id, function = %name, error = %e, "function call failed");
            }
            let decision = if e.status().is_client_error() { "deny" } else { "error" };
            audit_end(&request_id, &client, &name, decision, e.code(), started.elapsed().as_millis() as u64, 0);
            e.into_response()
        }
    }
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::RequestTooLarge
    } else {
        AppError::InvalidRequest(rejection.body_text())
    }
}

pub fn audit_end(
    request_id: &str,
    client: &str,
    function: &str,
    decision: &str,
    code: &str,
    duration_ms: u64,
    bytes_out: u64,
) {
    tracing::info!(
        request_id = request_id,
        client = client,
        function = function,
        decision = decision,
        code = code,
        duration_ms = duration_ms,
        bytes_out = bytes_out,
        "audit"
    );
}
