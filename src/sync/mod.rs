//! Holiday synchronisation: per-scope reconciliation, the range orchestrator
//! and the service façade used by the API, the CLI and the scheduler.
pub mod countries;
pub mod orchestrator;
pub mod reconcile;

use chrono::{Datelike, Local};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, instrument};

use crate::config::SyncConfig;
use crate::database_ops::provider::HolidayProvider;
use crate::database_ops::store::{HolidayStore, SharedStore};
use crate::error::{SyncError, SyncResult};
use crate::model::{year_bounds, Country, SyncOutcome, SyncReport};
use crate::search::{self, HolidayPage, SearchQuery};

pub use orchestrator::SyncOrchestrator;
pub use reconcile::ReconciliationEngine;

/// Oldest year the provider is queried for.
pub const MIN_YEAR: i32 = 1975;

pub fn current_year() -> i32 {
    Local::now().year()
}

/// Two upper-case ASCII letters (ISO 3166-1 alpha-2 shape).
pub fn is_country_code(code: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{2}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(code))
}

/// Validate a `(country_code, year)` scope coming from a caller.
pub fn validate_scope(country_code: &str, year: i32) -> SyncResult<()> {
    if !is_country_code(country_code) {
        return Err(SyncError::InvalidRequest(format!(
            "country_code must be two upper-case letters, got '{country_code}'"
        )));
    }
    let max = current_year();
    if !(MIN_YEAR..=max).contains(&year) {
        return Err(SyncError::InvalidRequest(format!(
            "year must be between {MIN_YEAR} and {max}, got {year}"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HolidayService {
    store: SharedStore,
    provider: Arc<dyn HolidayProvider>,
    orchestrator: SyncOrchestrator,
}

impl HolidayService {
    pub fn new(store: SharedStore, provider: Arc<dyn HolidayProvider>, cfg: SyncConfig) -> Self {
        let orchestrator = SyncOrchestrator::new(store.clone(), provider.clone(), cfg);
        Self {
            store,
            provider,
            orchestrator,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn sync_range(&self, start_year: i32, end_year: i32) -> SyncReport {
        self.orchestrator.sync_range(start_year, end_year).await
    }

    /// The `n` most recent years ending with the current one.
    pub async fn sync_recent_years(&self, n: u32) -> SyncReport {
        let end = current_year();
        let span = i32::try_from(n.max(1)).unwrap_or(i32::MAX);
        let start = end.saturating_sub(span - 1);
        self.sync_range(start, end).await
    }

    async fn resolve(&self, country_code: &str) -> SyncResult<Country> {
        self.store
            .find_country_by_code(country_code)
            .await?
            .ok_or_else(|| SyncError::UnknownCountryCode(country_code.to_string()))
    }

    /// Fetch and reconcile one scope; provider errors are returned as-is.
    #[instrument(skip(self))]
    pub async fn reconcile_one(&self, country_code: &str, year: i32) -> SyncResult<SyncOutcome> {
        validate_scope(country_code, year)?;
        let country = self.resolve(country_code).await?;
        let fetched = self.provider.fetch_holidays(&country.code, year).await?;
        let outcome = self
            .orchestrator
            .engine()
            .reconcile(&country, year, &fetched)
            .await?;
        info!(
            old = outcome.old_count,
            new = outcome.new_count,
            added = outcome.actual_added_count,
            deleted = outcome.actual_deleted_count,
            "scope refreshed"
        );
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete_scope(&self, country_code: &str, year: i32) -> SyncResult<u64> {
        validate_scope(country_code, year)?;
        let country = self.resolve(country_code).await?;
        let (start, end) = year_bounds(year)
            .ok_or_else(|| SyncError::InvalidRequest(format!("year {year} out of range")))?;
        let deleted = self
            .store
            .delete_by_country_and_date_range(&country, start, end)
            .await?;
        info!(deleted, "scope deleted");
        Ok(deleted)
    }

    pub async fn sync_countries(&self) -> SyncResult<usize> {
        countries::sync_countries(self.store.as_ref(), self.provider.as_ref()).await
    }

    pub async fn search(&self, query: &SearchQuery) -> SyncResult<HolidayPage> {
        search::search(self.store.as_ref(), query).await
    }
}
