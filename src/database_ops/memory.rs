//! In-process `HolidayStore` used by the test suite and `hk --dry-run`.
//!
//! Writes are staged on a copy of the state and swapped in only when the whole
//! operation succeeds, which gives the same all-or-nothing behaviour as a
//! database transaction.
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::database_ops::store::{HolidayFilter, HolidayStore, PageRequest, ScopePlan, ScopePlanner};
use crate::error::StoreError;
use crate::model::{Country, Holiday, HolidayKey, NewCountry};

#[derive(Debug, Default, Clone)]
struct State {
    countries: BTreeMap<i64, Country>,
    holidays: BTreeMap<i64, Holiday>,
    /// Identity key -> holiday id, mirrors the unique index of the SQL schema.
    by_key: HashMap<HolidayKey, i64>,
    next_country_id: i64,
    next_holiday_id: i64,
}

impl State {
    fn sorted_matching<F>(&self, pred: F) -> Vec<Holiday>
    where
        F: Fn(&Holiday) -> bool,
    {
        let mut out: Vec<Holiday> = self.holidays.values().filter(|h| pred(h)).cloned().collect();
        out.sort_by_key(|h| (h.date, h.id));
        out
    }

    fn remove(&mut self, id: i64) -> Option<Holiday> {
        let h = self.holidays.remove(&id)?;
        self.by_key.remove(&h.key());
        Some(h)
    }

    /// Callers run this on a staged copy; a failed save leaves it half-written.
    fn save(&mut self, mut h: Holiday) -> Result<Holiday, StoreError> {
        if !self.countries.contains_key(&h.country.id) {
            return Err(StoreError::Other(format!(
                "country {} ({}) does not exist",
                h.country.id, h.country.code
            )));
        }
        let id = match h.id {
            Some(id) => {
                self.remove(id)
                    .ok_or_else(|| StoreError::Conflict(format!("holiday {id} does not exist")))?;
                id
            }
            None => {
                self.next_holiday_id += 1;
                self.next_holiday_id
            }
        };
        if self.by_key.contains_key(&h.key()) {
            return Err(StoreError::Other(format!(
                "duplicate holiday {} {} for {}",
                h.date, h.name, h.country.code
            )));
        }
        h.id = Some(id);
        self.by_key.insert(h.key(), id);
        self.holidays.insert(id, h.clone());
        Ok(h)
    }

    fn apply(&mut self, delete_ids: &[i64], saves: Vec<Holiday>) -> Result<Vec<Holiday>, StoreError> {
        for &id in delete_ids {
            if self.remove(id).is_none() {
                return Err(StoreError::Conflict(format!("holiday {id} does not exist")));
            }
        }
        saves.into_iter().map(|h| self.save(h)).collect()
    }
}

fn in_filter(h: &Holiday, filter: &HolidayFilter) -> bool {
    h.country.id == filter.country_id
        && h.date >= filter.start
        && h.date <= filter.end
        && h.has_any_type(&filter.types)
}

#[derive(Debug, Default)]
pub struct MemoryHolidayStore {
    state: RwLock<State>,
    fail_writes: AtomicUsize,
}

impl MemoryHolidayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` write operations fail without touching any data.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let armed = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            Err(StoreError::Other("injected write failure".into()))
        } else {
            Ok(())
        }
    }

    /// Every stored holiday, ordered by date then id.
    pub async fn all_holidays(&self) -> Vec<Holiday> {
        self.state.read().await.sorted_matching(|_| true)
    }
}

#[async_trait]
impl HolidayStore for MemoryHolidayStore {
    async fn list_countries(&self) -> Result<Vec<Country>, StoreError> {
        let mut out: Vec<Country> = self.state.read().await.countries.values().cloned().collect();
        out.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(out)
    }

    async fn find_country_by_code(&self, code: &str) -> Result<Option<Country>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .countries
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn count_countries(&self) -> Result<i64, StoreError> {
        Ok(self.state.read().await.countries.len() as i64)
    }

    async fn replace_countries(&self, countries: &[NewCountry]) -> Result<usize, StoreError> {
        self.check_write()?;
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let mut kept: HashMap<String, i64> = HashMap::with_capacity(countries.len());
        for c in countries {
            let existing = next.countries.values().find(|e| e.code == c.code).map(|e| e.id);
            let id = match existing {
                Some(id) => id,
                None => {
                    next.next_country_id += 1;
                    next.next_country_id
                }
            };
            if kept.insert(c.code.clone(), id).is_some() {
                return Err(StoreError::Other(format!("duplicate country code {}", c.code)));
            }
            next.countries.insert(
                id,
                Country {
                    id,
                    code: c.code.clone(),
                    name: c.name.clone(),
                },
            );
        }

        let dropped: Vec<i64> = next
            .countries
            .values()
            .filter(|c| !kept.contains_key(&c.code))
            .map(|c| c.id)
            .collect();
        for id in dropped {
            if let Some(h) = next.holidays.values().find(|h| h.country.id == id) {
                return Err(StoreError::Other(format!(
                    "country {} still has holidays",
                    h.country.code
                )));
            }
            next.countries.remove(&id);
        }
        for h in next.holidays.values_mut() {
            if let Some(c) = next.countries.get(&h.country.id) {
                h.country = c.clone();
            }
        }
        *guard = next;
        Ok(countries.len())
    }

    async fn find_by_country_and_date_range(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Holiday>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .sorted_matching(|h| h.country.id == country.id && h.date >= start && h.date <= end))
    }

    async fn delete_by_country_and_date_range(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, StoreError> {
        self.check_write()?;
        let mut guard = self.state.write().await;
        let doomed: Vec<i64> = guard
            .holidays
            .values()
            .filter(|h| h.country.id == country.id && h.date >= start && h.date <= end)
            .filter_map(|h| h.id)
            .collect();
        for &id in &doomed {
            guard.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn save_all(&self, holidays: Vec<Holiday>) -> Result<Vec<Holiday>, StoreError> {
        self.apply_scope_changes(&[], holidays).await
    }

    async fn apply_scope_changes(
        &self,
        delete_ids: &[i64],
        saves: Vec<Holiday>,
    ) -> Result<Vec<Holiday>, StoreError> {
        self.check_write()?;
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let saved = next.apply(delete_ids, saves)?;
        *guard = next;
        Ok(saved)
    }

    async fn reconcile_scope(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
        plan: ScopePlanner,
    ) -> Result<ScopePlan, StoreError> {
        // The write guard is the scope lock: held from the read to the swap.
        let mut guard = self.state.write().await;
        let old = guard.sorted_matching(|h| h.country.id == country.id && h.date >= start && h.date <= end);
        let plan = plan(old);
        if plan.is_noop() {
            return Ok(plan);
        }
        self.check_write()?;
        let mut next = guard.clone();
        next.apply(&plan.delete_ids, plan.saves())?;
        *guard = next;
        Ok(plan)
    }

    async fn count_all(&self) -> Result<i64, StoreError> {
        Ok(self.state.read().await.holidays.len() as i64)
    }

    async fn search_holidays(
        &self,
        filter: &HolidayFilter,
        page: PageRequest,
    ) -> Result<Vec<Holiday>, StoreError> {
        let matches = self.state.read().await.sorted_matching(|h| in_filter(h, filter));
        Ok(matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .collect())
    }

    async fn count_matching(&self, filter: &HolidayFilter) -> Result<i64, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .holidays
            .values()
            .filter(|h| in_filter(h, filter))
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::year_bounds;

    fn holiday(country: &Country, ymd: (i32, u32, u32), name: &str) -> Holiday {
        Holiday {
            id: None,
            date: NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap(),
            local_name: name.into(),
            name: name.into(),
            country: country.clone(),
            fixed: true,
            global: true,
            counties: None,
            launch_year: None,
            types: "Public".into(),
        }
    }

    async fn seeded() -> (MemoryHolidayStore, Country) {
        let store = MemoryHolidayStore::new();
        store
            .replace_countries(&[NewCountry {
                code: "KR".into(),
                name: "South Korea".into(),
            }])
            .await
            .unwrap();
        let kr = store.find_country_by_code("KR").await.unwrap().unwrap();
        (store, kr)
    }

    #[tokio::test]
    async fn failed_scope_change_leaves_state_untouched() {
        let (store, kr) = seeded().await;
        let saved = store
            .save_all(vec![holiday(&kr, (2025, 1, 1), "New Year's Day")])
            .await
            .unwrap();
        let id = saved[0].id.unwrap();

        // Second save duplicates the identity key of the first: whole unit must roll back.
        let err = store
            .apply_scope_changes(
                &[id],
                vec![
                    holiday(&kr, (2025, 3, 1), "Independence Movement Day"),
                    holiday(&kr, (2025, 3, 1), "Independence Movement Day"),
                ],
            )
            .await;
        assert!(err.is_err());
        let all = store.all_holidays().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, Some(id));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let (store, kr) = seeded().await;
        store.fail_next_writes(1);
        assert!(store
            .save_all(vec![holiday(&kr, (2025, 1, 1), "New Year's Day")])
            .await
            .is_err());
        assert_eq!(store.count_all().await.unwrap(), 0);
        assert!(store
            .save_all(vec![holiday(&kr, (2025, 1, 1), "New Year's Day")])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn range_delete_and_country_replace() {
        let (store, kr) = seeded().await;
        store
            .save_all(vec![
                holiday(&kr, (2024, 12, 25), "Christmas Day"),
                holiday(&kr, (2025, 1, 1), "New Year's Day"),
                holiday(&kr, (2025, 12, 25), "Christmas Day"),
            ])
            .await
            .unwrap();
        let (start, end) = year_bounds(2025).unwrap();
        let in_2025 = store.find_by_country_and_date_range(&kr, start, end).await.unwrap();
        assert_eq!(in_2025.len(), 2);
        assert_eq!(store.delete_by_country_and_date_range(&kr, start, end).await.unwrap(), 2);
        assert_eq!(store.count_all().await.unwrap(), 1);
        // Freed identity keys can be stored again.
        store
            .save_all(vec![holiday(&kr, (2025, 1, 1), "New Year's Day")])
            .await
            .unwrap();
        store.delete_by_country_and_date_range(&kr, start, end).await.unwrap();

        // KR still owns a holiday, so it cannot drop out of the country set.
        let jp_only = [NewCountry {
            code: "JP".into(),
            name: "Japan".into(),
        }];
        assert!(store.replace_countries(&jp_only).await.is_err());
        assert!(store.find_country_by_code("KR").await.unwrap().is_some());
        assert!(store.find_country_by_code("JP").await.unwrap().is_none());

        let (start, _) = year_bounds(2024).unwrap();
        store.delete_by_country_and_date_range(&kr, start, end).await.unwrap();
        store.replace_countries(&jp_only).await.unwrap();
        assert!(store.find_country_by_code("KR").await.unwrap().is_none());
        assert_eq!(store.count_countries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn country_replace_keeps_ids_and_holidays() {
        let (store, kr) = seeded().await;
        store
            .save_all(vec![holiday(&kr, (2025, 1, 1), "New Year's Day")])
            .await
            .unwrap();
        store
            .replace_countries(&[
                NewCountry {
                    code: "JP".into(),
                    name: "Japan".into(),
                },
                NewCountry {
                    code: "KR".into(),
                    name: "Republic of Korea".into(),
                },
            ])
            .await
            .unwrap();

        let renamed = store.find_country_by_code("KR").await.unwrap().unwrap();
        assert_eq!(renamed.id, kr.id);
        assert_eq!(renamed.name, "Republic of Korea");
        let all = store.all_holidays().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].country, renamed);
    }

    #[tokio::test]
    async fn stale_writes_conflict_and_roll_back() {
        let (store, kr) = seeded().await;
        let saved = store
            .save_all(vec![
                holiday(&kr, (2025, 1, 1), "New Year's Day"),
                holiday(&kr, (2025, 3, 1), "Independence Movement Day"),
            ])
            .await
            .unwrap();
        let (x, y) = (saved[0].clone(), saved[1].clone());
        store.apply_scope_changes(&[y.id.unwrap()], Vec::new()).await.unwrap();

        let mut stale_update = y.clone();
        stale_update.local_name = "3·1절".into();
        let err = store.apply_scope_changes(&[], vec![stale_update]).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store
            .apply_scope_changes(&[x.id.unwrap(), y.id.unwrap()], Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.all_holidays().await, vec![x]);
    }
}
