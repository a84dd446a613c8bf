// API request/response models (DTOs)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::model::{HolidayType, SyncOutcome};
use crate::search::SearchQuery;
use crate::sync::{current_year, MIN_YEAR};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorDetail {
                code: code.into(),
                message: message.into(),
            }),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncRangeRequest {
    pub start_year: i32,
    pub end_year: i32,
}

impl SyncRangeRequest {
    pub fn validate(&self) -> SyncResult<()> {
        let max = current_year();
        for year in [self.start_year, self.end_year] {
            if !(MIN_YEAR..=max).contains(&year) {
                return Err(SyncError::InvalidRequest(format!(
                    "years must be between {MIN_YEAR} and {max}, got {year}"
                )));
            }
        }
        if self.start_year > self.end_year {
            return Err(SyncError::InvalidRequest(
                "start_year must not be after end_year".into(),
            ));
        }
        Ok(())
    }
}

/// Body of `PUT /holidays/refresh`; also the query of `DELETE /holidays`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScopeRequest {
    pub country_code: String,
    pub year: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub country_code: String,
    pub year: i32,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub country_code: String,
    pub year: i32,
    pub deleted_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountrySyncResponse {
    pub country_count: usize,
}

/// Query string of `GET /holidays/search`. `types` is comma separated,
/// e.g. `types=PUBLIC,SCHOOL`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub country_code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub types: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl SearchParams {
    pub fn into_query(self) -> SyncResult<SearchQuery> {
        let types = self
            .types
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<HolidayType>().map_err(SyncError::InvalidRequest))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(SearchQuery {
            country_code: self.country_code,
            start_date: self.start_date,
            end_date: self.end_date,
            types,
            page: self.page,
            size: self.size,
        })
    }
}
