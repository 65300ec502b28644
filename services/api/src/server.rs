use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState, LocalServices};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use deal_pipeline::config::AppConfig;
use deal_pipeline::error::AppError;
use deal_pipeline::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(secs) = args.auto_advance_secs.take() {
        config.pipeline.auto_advance_delay = Duration::from_secs(secs);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = LocalServices::default();
    let engine = build_engine(&config, &services)?;

    let app = with_pipeline_routes(engine.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        auto_advance_secs = config.pipeline.auto_advance_delay.as_secs(),
        "deal flow pipeline ready"
    );

    let served = axum::serve(listener, app).await;
    engine.shutdown();
    served?;
    Ok(())
}
