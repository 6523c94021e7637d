use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rendix::application::chargebacks::ChargebackProcessor;
use rendix::application::coordinator::MultiRegionCoordinator;
use rendix::application::reconciliation::ReconciliationEngine;
use rendix::application::region_job::RegionSyncJob;
use rendix::client::provider_client::{ProviderClient, RetryPolicy};
use rendix::client::session::AuthSessionManager;
use rendix::client::transport::HttpTransport;
use rendix::config::{DatabaseConfig, ProviderConfig, SyncConfig};
use rendix::domain::date_range::DateRange;
use rendix::persistence::audit_repository::SqliteSettlementAuditRepository;
use rendix::persistence::collection_repository::SqliteCollectionRepository;
use rendix::persistence::init_database_with_connections;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rendix=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Rendix settlement sync starting...");

    let sync_config = SyncConfig::from_env();
    let provider_config = ProviderConfig::from_env()?;
    let database_config = DatabaseConfig::from_env();

    info!(
        "Configured for {} regions, {} days back, pool size {}",
        sync_config.regions.len(),
        sync_config.days_back,
        sync_config.pool_size
    );

    let pool = init_database_with_connections(
        &database_config.url,
        database_config.max_connections,
    )
    .await?;
    let collections = Arc::new(SqliteCollectionRepository::new(pool.clone()));
    let audit = Arc::new(SqliteSettlementAuditRepository::new(pool));

    let transport = Arc::new(HttpTransport::new(provider_config.api_url.clone()));
    let org_id = provider_config.org_id;
    let session = Arc::new(AuthSessionManager::new(transport.clone(), provider_config));
    let client = Arc::new(ProviderClient::new(
        transport,
        session,
        org_id,
        RetryPolicy {
            max_retries: sync_config.max_retries,
            base_delay: sync_config.retry_base_delay,
        },
    ));

    let engine = Arc::new(ReconciliationEngine::new(collections.clone(), audit));
    let chargebacks = Arc::new(ChargebackProcessor::new(collections));
    let job = Arc::new(RegionSyncJob::new(
        client,
        engine,
        chargebacks,
        sync_config.chargebacks_enabled,
    ));
    let coordinator = MultiRegionCoordinator::new(
        job,
        sync_config.pool_size,
        sync_config.per_region_timeout,
    );

    let range = DateRange::lookback(sync_config.days_back, sync_config.max_lookback_days)?;
    info!("Query range: {}", range);

    let consolidated = coordinator
        .sync_regions(&sync_config.regions, range)
        .await?;

    for result in &consolidated.results {
        if result.success {
            info!(
                "Region {}: {} settlements, {} records updated, {} orphans",
                result.region_code,
                result.settlements_fetched,
                result.records_updated,
                result.orphan_transactions
            );
        } else {
            error!(
                "Region {}: failed: {}",
                result.region_code,
                result.error_message.as_deref().unwrap_or("unknown")
            );
        }
    }
    info!(
        "Run complete: {}/{} regions succeeded, {} settlements, {} records updated, {} orphans",
        consolidated.regions_succeeded,
        consolidated.regions_total(),
        consolidated.total_settlements,
        consolidated.total_records_updated,
        consolidated.total_orphans
    );

    Ok(())
}
