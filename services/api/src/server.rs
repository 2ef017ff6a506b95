use crate::cli::ServeArgs;
use crate::infra::{load_store, AppState};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use relief_match::config::AppConfig;
use relief_match::error::AppError;
use relief_match::telemetry;
use relief_match::workflows::matching::{ReliefMatchService, ZipCodeBaseClient};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(dir) = args.seed_dir.take() {
        config.seed_dir = Some(dir);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = load_store(config.seed_dir.as_deref())?;
    let distance = ZipCodeBaseClient::new(config.distance.clone());
    if !distance.is_configured() {
        warn!("DISTANCE_API_KEY not set; nearest matching will rank by fulfillment");
    }
    let match_service = Arc::new(ReliefMatchService::new(
        store,
        Arc::new(distance),
        config.matching,
        config.distance.timeout,
    ));

    let app = with_matching_routes(match_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "relief match service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
