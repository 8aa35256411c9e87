use crate::cli::ServeArgs;
use crate::infra::{admin_gate, rest_backend, AppState};
use crate::routes::with_quote_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tidyhome::config::AppConfig;
use tidyhome::error::AppError;
use tidyhome::quotes::QuoteReadCache;
use tidyhome::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = rest_backend(&config)?;
    let gate = admin_gate(&config, backend.clone())?;
    let cache = Arc::new(QuoteReadCache::new(backend, config.cache));

    let app = with_quote_routes(cache, gate, config.session.revalidate_secret.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        ttl_secs = config.cache.ttl.as_secs(),
        "quote back-office ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
