use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryPeopleDirectory, InMemoryTemplateCatalog, LoggingNotifier};
use crate::routes::with_evaluation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use review_cycle::config::AppConfig;
use review_cycle::error::AppError;
use review_cycle::telemetry;
use review_cycle::workflows::evaluations::{EvaluationService, InMemoryEvaluationStore};
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let evaluation_service = Arc::new(EvaluationService::new(
        Arc::new(InMemoryEvaluationStore::new()),
        Arc::new(LoggingNotifier::default()),
        Arc::new(InMemoryPeopleDirectory::seeded()),
        Arc::new(InMemoryTemplateCatalog::seeded()),
        config.scheduling,
    ));

    let app = with_evaluation_routes(evaluation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        due_soon_days = config.scheduling.due_soon_days,
        "review cycle service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
