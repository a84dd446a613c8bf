//! holiday-keeper service: seeds an empty database, runs the yearly refresh
//! job and serves the HTTP API.
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use holiday_keeper::api::{ApiServer, AppState};
use holiday_keeper::bootstrap::seed_if_empty;
use holiday_keeper::config::{ProviderConfig, SyncConfig, LOGGED_KEYS};
use holiday_keeper::database_ops::db::Db;
use holiday_keeper::database_ops::nager::NagerProvider;
use holiday_keeper::database_ops::pg_store::PgHolidayStore;
use holiday_keeper::sync::HolidayService;
use holiday_keeper::util::env as env_util;
use holiday_keeper::{scheduler, telemetry};

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    telemetry::init_tracing("info,sqlx=warn,actix_web=info")?;
    env_util::preflight_check("holiday-keeper", &["API_SECRET"], LOGGED_KEYS)?;

    let server = ApiServer::from_env()?;
    let provider_cfg = ProviderConfig::from_env();
    let sync_cfg = SyncConfig::from_env();

    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let auto_migrate = env_util::env_flag("AUTO_MIGRATE", false);
    let db = Db::connect(&database_url, max_connections, auto_migrate).await?;

    let provider = NagerProvider::new(&provider_cfg).context("building holiday provider client")?;
    info!(base_url = provider.base_url(), "holiday provider configured");

    let service = HolidayService::new(
        Arc::new(PgHolidayStore::new(db)),
        Arc::new(provider),
        sync_cfg.clone(),
    );

    if sync_cfg.sync_on_startup {
        let seed_service = service.clone();
        actix_web::rt::spawn(async move {
            let summary = seed_if_empty(&seed_service).await;
            info!(?summary, "startup seeding done");
        });
    }
    if sync_cfg.schedule_enabled {
        scheduler::spawn(service.clone());
    }

    server.run(AppState::new(service)).await
}
