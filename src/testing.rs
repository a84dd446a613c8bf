//! Fixtures shared by the unit tests: a scripted provider and record builders.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::database_ops::memory::MemoryHolidayStore;
use crate::database_ops::provider::{CountryRecord, HolidayProvider, HolidayRecord};
use crate::database_ops::store::HolidayStore;
use crate::error::ProviderError;
use crate::model::NewCountry;

pub fn record(date: &str, name: &str) -> HolidayRecord {
    HolidayRecord {
        date: date.into(),
        local_name: name.into(),
        name: name.into(),
        country_code: None,
        fixed: true,
        global: true,
        counties: None,
        launch_year: None,
        types: vec!["Public".into()],
    }
}

pub fn country(code: &str, name: &str) -> CountryRecord {
    CountryRecord {
        country_code: code.into(),
        name: name.into(),
    }
}

pub async fn seeded_store(countries: &[(&str, &str)]) -> Arc<MemoryHolidayStore> {
    let store = Arc::new(MemoryHolidayStore::new());
    let rows: Vec<NewCountry> = countries
        .iter()
        .map(|(code, name)| NewCountry {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect();
    store.replace_countries(&rows).await.unwrap();
    store
}

#[derive(Debug, Clone)]
pub enum Reply {
    Records(Vec<HolidayRecord>),
    Fail,
    /// Never answers within any sane unit timeout.
    Hang,
}

/// In-memory `HolidayProvider`. Unscripted scopes answer with two holidays
/// (New Year's Day and Christmas Day) of the requested year.
#[derive(Default)]
pub struct ScriptedProvider {
    countries: Mutex<Option<Vec<CountryRecord>>>,
    replies: Mutex<HashMap<(String, i32), Reply>>,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_countries(self, countries: Vec<CountryRecord>) -> Self {
        *self.countries.lock().unwrap() = Some(countries);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn reply(&self, code: &str, year: i32, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((code.to_string(), year), reply);
    }

    pub fn default_records(year: i32) -> Vec<HolidayRecord> {
        vec![
            record(&format!("{year}-01-01"), "New Year's Day"),
            record(&format!("{year}-12-25"), "Christmas Day"),
        ]
    }
}

#[async_trait]
impl HolidayProvider for ScriptedProvider {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>, ProviderError> {
        self.countries
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Malformed("countries not scripted".into()))
    }

    async fn fetch_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> Result<Vec<HolidayRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&(country_code.to_string(), year))
            .cloned();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let out = match reply {
            None => Ok(Self::default_records(year)),
            Some(Reply::Records(r)) => Ok(r),
            Some(Reply::Fail) => Err(ProviderError::Http {
                status: 500,
                url: format!("scripted://{year}/{country_code}"),
                body: "scripted failure".into(),
            }),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}
