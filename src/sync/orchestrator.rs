use chrono::Utc;
use futures::{stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::SyncConfig;
use crate::database_ops::provider::{HolidayProvider, HolidayRecord};
use crate::database_ops::store::{HolidayStore, SharedStore};
use crate::error::{ProviderError, SyncError};
use crate::model::{Country, SyncReport};
use crate::sync::countries::sync_countries;
use crate::sync::reconcile::ReconciliationEngine;

/// One fetched (country, year) unit waiting for the apply stage.
struct FetchedUnit {
    country: Country,
    year: i32,
    records: Result<Vec<HolidayRecord>, ProviderError>,
}

/// Runs a country × year range in two stages: a bounded concurrent fetch,
/// then a sequential apply through the reconciliation engine.
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: SharedStore,
    provider: Arc<dyn HolidayProvider>,
    engine: ReconciliationEngine,
    cfg: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(store: SharedStore, provider: Arc<dyn HolidayProvider>, cfg: SyncConfig) -> Self {
        let engine = ReconciliationEngine::new(store.clone());
        Self {
            store,
            provider,
            engine,
            cfg,
        }
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Stored countries; an empty store triggers a country sync first.
    async fn countries(&self) -> Vec<Country> {
        match self.store.list_countries().await {
            Ok(list) if !list.is_empty() => return list,
            Ok(_) => info!("no countries stored; syncing country list first"),
            Err(e) => {
                warn!(error = %e, "listing countries failed");
                return Vec::new();
            }
        }
        if let Err(e) = sync_countries(self.store.as_ref(), self.provider.as_ref()).await {
            warn!(error = %e, code = e.code(), "country sync failed; continuing with no countries");
            return Vec::new();
        }
        self.store.list_countries().await.unwrap_or_else(|e| {
            warn!(error = %e, "listing countries failed after country sync");
            Vec::new()
        })
    }

    async fn fetch_all(&self, units: Vec<(Country, i32)>) -> Vec<FetchedUnit> {
        let timeout = self.cfg.unit_timeout;
        stream::iter(units.into_iter().map(|(country, year)| {
            let provider = self.provider.clone();
            async move {
                let records = match tokio::time::timeout(
                    timeout,
                    provider.fetch_holidays(&country.code, year),
                )
                .await
                {
                    Ok(res) => res,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                };
                if let Err(e) = &records {
                    warn!(country = %country.code, year, error = %e, "holiday fetch failed");
                }
                FetchedUnit {
                    country,
                    year,
                    records,
                }
            }
        }))
        .buffer_unordered(self.cfg.fetch_concurrency.max(1))
        .collect()
        .await
    }

    /// Synchronise every stored country for `start_year..=end_year`.
    ///
    /// Per-unit failures are counted, never returned; an inverted range is
    /// simply zero units.
    #[instrument(skip(self))]
    pub async fn sync_range(&self, start_year: i32, end_year: i32) -> SyncReport {
        let start_time = Utc::now();
        let started = Instant::now();

        let countries = self.countries().await;
        let units: Vec<(Country, i32)> = countries
            .iter()
            .flat_map(|c| (start_year..=end_year).map(move |y| (c.clone(), y)))
            .collect();
        let total = units.len();
        info!(
            countries = countries.len(),
            units = total,
            concurrency = self.cfg.fetch_concurrency,
            "sync range started"
        );

        let mut fetched = self.fetch_all(units).await;
        fetched.sort_by(|a, b| (&a.country.code, a.year).cmp(&(&b.country.code, b.year)));

        let mut success = 0usize;
        let mut fail = 0usize;
        for unit in fetched {
            let records = match unit.records {
                Ok(r) if !r.is_empty() => r,
                Ok(_) => {
                    let e = SyncError::empty(&unit.country.code, Some(unit.year));
                    warn!(country = %unit.country.code, year = unit.year, code = e.code(), "skipping unit");
                    fail += 1;
                    continue;
                }
                Err(_) => {
                    fail += 1;
                    continue;
                }
            };
            match self.engine.reconcile(&unit.country, unit.year, &records).await {
                Ok(outcome) => {
                    success += 1;
                    info!(
                        country = %unit.country.code,
                        year = unit.year,
                        old = outcome.old_count,
                        new = outcome.new_count,
                        added = outcome.actual_added_count,
                        deleted = outcome.actual_deleted_count,
                        "unit synced"
                    );
                }
                Err(e) => {
                    fail += 1;
                    warn!(country = %unit.country.code, year = unit.year, error = %e, code = e.code(), "unit failed");
                }
            }
        }

        let end_time = Utc::now();
        let report = SyncReport {
            total_count: total,
            success_count: success,
            fail_count: fail,
            country_count: countries.len(),
            year_range: format!("{start_year}-{end_year}"),
            start_time,
            end_time,
            duration_seconds: started.elapsed().as_secs() as i64,
        };
        info!(
            total = report.total_count,
            success = report.success_count,
            fail = report.fail_count,
            secs = report.duration_seconds,
            "sync range finished"
        );
        report
    }
}
