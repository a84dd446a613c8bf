//! Paginated holiday search over the store.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::database_ops::store::{HolidayFilter, HolidayStore, PageRequest};
use crate::error::{SyncError, SyncResult};
use crate::model::{Holiday, HolidayType};
use crate::sync::{current_year, is_country_code, MIN_YEAR};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_TYPE_FILTERS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchQuery {
    pub country_code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub types: Vec<HolidayType>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl SearchQuery {
    pub fn new(country_code: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            country_code: country_code.into(),
            start_date,
            end_date,
            types: Vec::new(),
            page: None,
            size: None,
        }
    }

    /// Normalised page/size: page defaults to 0 (negatives too), size
    /// defaults to 20 and is capped at 100.
    pub fn page_request(&self) -> PageRequest {
        let page = self
            .page
            .filter(|p| *p >= 0)
            .map_or(0, |p| u32::try_from(p).unwrap_or(u32::MAX));
        let size = match self.size {
            None => DEFAULT_PAGE_SIZE,
            Some(s) if s < 1 => DEFAULT_PAGE_SIZE,
            Some(s) => u32::try_from(s).unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE),
        };
        PageRequest { page, size }
    }

    pub fn validate(&self) -> SyncResult<()> {
        let invalid = |msg: String| Err(SyncError::InvalidRequest(msg));
        if !is_country_code(&self.country_code) {
            return invalid(format!(
                "country_code must be two upper-case letters, got '{}'",
                self.country_code
            ));
        }
        if self.start_date.year() < MIN_YEAR {
            return invalid(format!("start_date must be on or after {MIN_YEAR}-01-01"));
        }
        if self.start_date > self.end_date {
            return invalid("start_date must not be after end_date".into());
        }
        if self.end_date.year() > current_year() {
            return invalid("end_date cannot be later than the current year".into());
        }
        if self.types.len() > MAX_TYPE_FILTERS {
            return invalid(format!("at most {MAX_TYPE_FILTERS} types may be given"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolidayItem {
    pub id: i64,
    pub date: NaiveDate,
    pub local_name: String,
    pub name: String,
    pub country_id: i64,
    pub country_name: String,
    pub counties: Vec<String>,
    pub types: Vec<String>,
}

impl From<Holiday> for HolidayItem {
    fn from(h: Holiday) -> Self {
        let types = h.types_list();
        let counties = h.counties_list();
        Self {
            id: h.id.unwrap_or_default(),
            date: h.date,
            local_name: h.local_name,
            name: h.name,
            country_id: h.country.id,
            country_name: h.country.name,
            counties,
            types,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub page_size: u32,
    pub number_of_elements: usize,
    pub total_elements: i64,
    pub total_pages: i64,
    pub is_first: bool,
    pub is_last: bool,
    pub is_empty: bool,
}

impl PageInfo {
    pub fn new(page: PageRequest, number_of_elements: usize, total_elements: i64) -> Self {
        let size = i64::from(page.size.max(1));
        let total_pages = (total_elements + size - 1) / size;
        Self {
            current_page: page.page,
            page_size: page.size,
            number_of_elements,
            total_elements,
            total_pages,
            is_first: page.page == 0,
            is_last: i64::from(page.page) >= total_pages - 1,
            is_empty: number_of_elements == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolidayPage {
    pub holidays: Vec<HolidayItem>,
    pub page_info: PageInfo,
}

pub async fn search(store: &dyn HolidayStore, query: &SearchQuery) -> SyncResult<HolidayPage> {
    query.validate()?;
    let country = store
        .find_country_by_code(&query.country_code)
        .await?
        .ok_or_else(|| SyncError::UnknownCountryCode(query.country_code.clone()))?;
    let filter = HolidayFilter {
        country_id: country.id,
        start: query.start_date,
        end: query.end_date,
        types: query.types.clone(),
    };
    let page = query.page_request();
    let rows = store.search_holidays(&filter, page).await?;
    let total = store.count_matching(&filter).await?;
    let holidays: Vec<HolidayItem> = rows.into_iter().map(HolidayItem::from).collect();
    let page_info = PageInfo::new(page, holidays.len(), total);
    Ok(HolidayPage {
        holidays,
        page_info,
    })
}
