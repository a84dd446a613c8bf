//! Persistence gateway for countries and holidays.
//!
//! Two implementations live next to this trait: `PgHolidayStore` for the
//! service and `MemoryHolidayStore` for tests and dry runs. Both must apply
//! `apply_scope_changes` and `replace_countries` all-or-nothing.
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{Country, Holiday, HolidayType, NewCountry, SyncOutcome};

/// Filter used by the search read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayFilter {
    pub country_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Matches holidays carrying any of these tags; empty = no type filter.
    pub types: Vec<HolidayType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }
}

/// Changes needed to move a scope from its stored state to the fetched state.
#[derive(Debug, Default)]
pub struct ScopePlan {
    pub inserts: Vec<Holiday>,
    pub updates: Vec<Holiday>,
    pub delete_ids: Vec<i64>,
    pub old_count: usize,
    pub new_count: usize,
}

impl ScopePlan {
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.delete_ids.is_empty()
    }

    pub fn outcome(&self) -> SyncOutcome {
        SyncOutcome {
            old_count: self.old_count,
            new_count: self.new_count,
            actual_added_count: self.inserts.len(),
            actual_deleted_count: self.delete_ids.len(),
        }
    }

    /// Inserts followed by updates, in the order they are written.
    pub fn saves(&self) -> Vec<Holiday> {
        self.inserts.iter().chain(&self.updates).cloned().collect()
    }
}

/// Turns the rows currently stored for a scope into the plan to apply.
pub type ScopePlanner = Box<dyn FnOnce(Vec<Holiday>) -> ScopePlan + Send>;

#[async_trait]
pub trait HolidayStore: Send + Sync {
    async fn list_countries(&self) -> Result<Vec<Country>, StoreError>;

    async fn find_country_by_code(&self, code: &str) -> Result<Option<Country>, StoreError>;

    async fn count_countries(&self) -> Result<i64, StoreError>;

    /// Make `countries` the stored set in one transaction, matching existing
    /// rows on code so their ids (and holidays) survive. A country that drops
    /// out of the set while it still owns holidays fails the whole call.
    /// Returns the number of countries in the new set.
    async fn replace_countries(&self, countries: &[NewCountry]) -> Result<usize, StoreError>;

    /// Holidays of `country` dated within `[start, end]`, ordered by date then id.
    async fn find_by_country_and_date_range(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Holiday>, StoreError>;

    async fn delete_by_country_and_date_range(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, StoreError>;

    /// Insert rows without an id, update rows with one.
    async fn save_all(&self, holidays: Vec<Holiday>) -> Result<Vec<Holiday>, StoreError>;

    /// Delete `delete_ids`, then save `saves`, as one atomic unit. A delete or
    /// update whose row no longer exists fails with `StoreError::Conflict`.
    async fn apply_scope_changes(
        &self,
        delete_ids: &[i64],
        saves: Vec<Holiday>,
    ) -> Result<Vec<Holiday>, StoreError>;

    /// Read the holidays of `country` within `[start, end]`, hand them to
    /// `plan` and apply the result, holding the country locked against
    /// concurrent reconciles from the read until the commit. Returns the
    /// plan that was applied; a no-op plan writes nothing.
    async fn reconcile_scope(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
        plan: ScopePlanner,
    ) -> Result<ScopePlan, StoreError>;

    async fn count_all(&self) -> Result<i64, StoreError>;

    /// One page of matches ordered by `date ASC, id ASC`.
    async fn search_holidays(
        &self,
        filter: &HolidayFilter,
        page: PageRequest,
    ) -> Result<Vec<Holiday>, StoreError>;

    async fn count_matching(&self, filter: &HolidayFilter) -> Result<i64, StoreError>;
}

pub type SharedStore = Arc<dyn HolidayStore>;
