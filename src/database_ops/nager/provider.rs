use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::database_ops::provider::{CountryRecord, HolidayProvider, HolidayRecord};
use crate::error::ProviderError;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Nager.Date public holiday API client.
/// Public API (base): https://date.nager.at/api/v3
///
/// Key endpoints:
/// - GET /AvailableCountries - every supported country (code + English name)
/// - GET /PublicHolidays/{year}/{countryCode} - holidays of one country/year
#[derive(Debug, Clone)]
pub struct NagerProvider {
    base_url: String,
    http: Client,
}

impl NagerProvider {
    pub fn new(cfg: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .user_agent(concat!("holiday-keeper/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.read_timeout)
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn holidays_url(&self, country_code: &str, year: i32) -> String {
        format!("{}/PublicHolidays/{}/{}", self.base_url, year, country_code)
    }

    /// GET `url` and decode a JSON array; 204 or a blank body decode to `[]`.
    async fn get_list<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ProviderError> {
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            return Err(ProviderError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str::<Vec<T>>(&text).map_err(|e| {
            ProviderError::Malformed(format!(
                "{url}: {e} body={}",
                truncate_for_log(text.clone(), 200)
            ))
        })
    }
}

#[async_trait]
impl HolidayProvider for NagerProvider {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>, ProviderError> {
        let url = format!("{}/AvailableCountries", self.base_url);
        debug!(url = %url, "fetching available countries");
        match self.get_list::<CountryRecord>(&url).await {
            Ok(list) => {
                if list.is_empty() {
                    warn!("country list response was empty");
                } else {
                    info!(count = list.len(), "fetched available countries");
                }
                Ok(list)
            }
            Err(e) => {
                warn!(error = %e, "country list request failed");
                Err(e)
            }
        }
    }

    async fn fetch_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> Result<Vec<HolidayRecord>, ProviderError> {
        let url = self.holidays_url(country_code, year);
        match self.get_list::<HolidayRecord>(&url).await {
            Ok(list) => {
                debug!(country = %country_code, year, count = list.len(), "fetched holidays");
                Ok(list)
            }
            Err(e) => {
                warn!(country = %country_code, year, error = %e, "holiday request failed");
                Err(e)
            }
        }
    }
}
