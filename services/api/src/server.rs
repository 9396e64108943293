use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::api_router;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use terrarisk::config::AppConfig;
use terrarisk::dataset::DatasetAccessor;
use terrarisk::error::AppError;
use terrarisk::ledger::WorkshopLedger;
use terrarisk::ranking::compute_platform_ranking;
use terrarisk::store::MemoryStore;
use terrarisk::telemetry;
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

    let dataset = Arc::new(DatasetAccessor::from_path(&config.workshop.dataset_path)?);
    let platform = Arc::new(compute_platform_ranking(&dataset));
    let ledger = Arc::new(WorkshopLedger::new(
        Arc::new(MemoryStore::default()),
        config.workshop.initial_credits,
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        ledger,
        dataset,
        platform,
        readiness: readiness_flag.clone(),
        metrics: Some(Arc::new(prometheus_handle)),
    };

    let app = api_router(app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "terrarisk workshop engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
