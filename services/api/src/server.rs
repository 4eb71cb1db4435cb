use crate::cli::ServeArgs;
use crate::infra::{AppState, Marketplace};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gig_market::config::AppConfig;
use gig_market::error::AppError;
use gig_market::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let marketplace = Marketplace::in_memory();
    if let Some(seed) = args.seed.take() {
        let summary = marketplace.seed_from(&seed)?;
        info!(
            path = %seed.display(),
            jobs = summary.jobs,
            applications = summary.applications,
            "seed data imported"
        );
    }

    let app = with_marketplace_routes(marketplace.service, marketplace.workers)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "gig marketplace service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
