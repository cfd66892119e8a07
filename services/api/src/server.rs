use crate::cli::ServeArgs;
use crate::infra::{build_services, seed_units, AppState};
use crate::routes::with_scheduling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use ubs_scheduling::config::AppConfig;
use ubs_scheduling::error::AppError;
use ubs_scheduling::scheduling::{InMemoryStore, SystemClock};
use ubs_scheduling::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(config.environment, &config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = InMemoryStore::with_units(seed_units());
    let (patients, units) = build_services(&store, Arc::new(SystemClock), config.scheduling);

    let app = with_scheduling_routes(patients, units)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        utc_offset = %config.scheduling.utc_offset,
        "ubs scheduling service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
