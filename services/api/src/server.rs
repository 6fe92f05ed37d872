use crate::cli::ServeArgs;
use crate::infra::{
    AppState, HeuristicConfidenceSource, InMemoryAbTestRegistry, InMemoryAssignmentStore,
    InMemoryRuleStore, StaticItemCatalog,
};
use crate::routes::with_pricing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use clearquote::config::AppConfig;
use clearquote::error::AppError;
use clearquote::pricing::{ItemCatalog, QuoteService};
use clearquote::telemetry;
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

    let catalog: Arc<dyn ItemCatalog> = Arc::new(StaticItemCatalog::seeded());
    let quote_service = Arc::new(QuoteService::new(
        Arc::new(InMemoryRuleStore::seeded()),
        Arc::new(InMemoryAssignmentStore::default()),
        Arc::new(InMemoryAbTestRegistry::seeded()),
        catalog.clone(),
        Arc::new(HeuristicConfidenceSource::new(catalog)),
        config.engine,
    ));

    let app = with_pricing_routes(quote_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "pricing engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
