//! Key-based reconciliation of one (country, year) scope.
//!
//! Old and fresh rows are matched on `HolidayKey`; only genuine appearances
//! and disappearances count as added/deleted. Rows whose key survives but
//! whose content changed are updated in place and keep their id.
use chrono::{Datelike, NaiveDate};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

use crate::database_ops::provider::HolidayRecord;
use crate::database_ops::store::{HolidayStore, ScopePlan, SharedStore};
use crate::error::{ProviderError, SyncError, SyncResult};
use crate::model::{canonical_list, year_bounds, Country, Holiday, HolidayKey, HolidayType, SyncOutcome};

fn record_to_holiday(country: &Country, r: &HolidayRecord) -> Result<Holiday, ProviderError> {
    let date = NaiveDate::parse_from_str(r.date.trim(), "%Y-%m-%d")
        .map_err(|e| ProviderError::Malformed(format!("bad date '{}': {e}", r.date)))?;
    let types = r
        .types
        .iter()
        .map(|t| t.parse::<HolidayType>().map_err(ProviderError::Malformed))
        .collect::<Result<Vec<_>, _>>()?;
    let types = canonical_list(types.iter().map(HolidayType::as_str)).ok_or_else(|| {
        ProviderError::Malformed(format!("holiday '{}' on {date} has no types", r.name))
    })?;
    Ok(Holiday {
        id: None,
        date,
        local_name: r.local_name.clone(),
        name: r.name.clone(),
        country: country.clone(),
        fixed: r.fixed,
        global: r.global,
        counties: r.counties.as_ref().and_then(canonical_list),
        launch_year: r.launch_year,
        types,
    })
}

/// Map provider records into canonical holidays for `country`/`year`.
///
/// Records dated outside `year` are dropped; on identity-key collisions the
/// first record wins.
pub fn canonical_holidays(
    country: &Country,
    year: i32,
    fetched: &[HolidayRecord],
) -> Result<Vec<Holiday>, ProviderError> {
    let mut seen: HashSet<HolidayKey> = HashSet::with_capacity(fetched.len());
    let mut out = Vec::with_capacity(fetched.len());
    for r in fetched {
        let h = record_to_holiday(country, r)?;
        if h.date.year() != year {
            warn!(country = %country.code, year, date = %h.date, name = %h.name, "dropping out-of-scope holiday");
            continue;
        }
        if seen.insert(h.key()) {
            out.push(h);
        } else {
            debug!(country = %country.code, date = %h.date, name = %h.name, "duplicate provider record ignored");
        }
    }
    Ok(out)
}

/// Diff stored rows against fresh rows of the same scope.
pub fn plan_scope(old: Vec<Holiday>, fresh: Vec<Holiday>) -> ScopePlan {
    let old_count = old.len();
    let new_count = fresh.len();
    let mut plan = ScopePlan {
        old_count,
        new_count,
        ..ScopePlan::default()
    };

    let mut old_by_key: HashMap<HolidayKey, Holiday> = HashMap::with_capacity(old_count);
    for h in old {
        let key = h.key();
        if old_by_key.contains_key(&key) {
            // Stored duplicates can only come from out-of-band writes; drop the extras.
            plan.delete_ids.extend(h.id);
            continue;
        }
        old_by_key.insert(key, h);
    }

    for h in fresh {
        match old_by_key.remove(&h.key()) {
            None => plan.inserts.push(h),
            Some(mut existing) => {
                if !existing.same_content(&h) {
                    existing.update_from(&h);
                    plan.updates.push(existing);
                }
            }
        }
    }

    // Whatever is left in the old map vanished from the provider.
    let mut leftovers: Vec<Holiday> = old_by_key.into_values().collect();
    leftovers.sort_by_key(|h| (h.date, h.id));
    plan.delete_ids.extend(leftovers.into_iter().filter_map(|h| h.id));
    plan
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: SharedStore,
}

impl ReconciliationEngine {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Replace the stored holidays of `country`/`year` with `fetched`.
    ///
    /// An empty `fetched` is a provider failure, never "no holidays": nothing
    /// is read or written in that case.
    #[instrument(skip(self, country, fetched), fields(country = %country.code, fetched = fetched.len()))]
    pub async fn reconcile(
        &self,
        country: &Country,
        year: i32,
        fetched: &[HolidayRecord],
    ) -> SyncResult<SyncOutcome> {
        if fetched.is_empty() {
            return Err(SyncError::empty(&country.code, Some(year)));
        }
        let (start, end) = year_bounds(year)
            .ok_or_else(|| SyncError::InvalidRequest(format!("year {year} out of range")))?;

        let fresh = canonical_holidays(country, year, fetched)?;
        if fresh.is_empty() {
            return Err(SyncError::empty(&country.code, Some(year)));
        }
        let plan = self
            .store
            .reconcile_scope(country, start, end, Box::new(move |old| plan_scope(old, fresh)))
            .await?;
        let outcome = plan.outcome();

        if plan.is_noop() {
            debug!(old = outcome.old_count, "scope unchanged");
            return Ok(outcome);
        }

        let updated = plan.updates.len();
        debug!(
            old = outcome.old_count,
            new = outcome.new_count,
            added = outcome.actual_added_count,
            updated,
            deleted = outcome.actual_deleted_count,
            "scope reconciled"
        );
        Ok(outcome)
    }
}
