//! Seam between the sync engine and whichever holiday API feeds it.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Country entry from `/AvailableCountries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub country_code: String,
    pub name: String,
}

/// Holiday entry from `/PublicHolidays/{year}/{code}`, exactly as the API
/// sends it. Dates and type tags are validated later by the engine so one bad
/// record fails only its own scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayRecord {
    pub date: String,
    pub local_name: String,
    pub name: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub counties: Option<Vec<String>>,
    #[serde(default)]
    pub launch_year: Option<i32>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[async_trait]
pub trait HolidayProvider: Send + Sync {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>, ProviderError>;

    /// An empty list is a valid answer here; deciding whether emptiness is a
    /// failure belongs to the caller.
    async fn fetch_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> Result<Vec<HolidayRecord>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nager_payload() {
        let raw = r#"[
            {"date":"2025-03-01","localName":"삼일절","name":"Independence Movement Day",
             "countryCode":"KR","fixed":true,"global":true,"counties":null,
             "launchYear":1949,"types":["Public"]},
            {"date":"2025-01-20","localName":"Martin Luther King, Jr. Day",
             "name":"Martin Luther King, Jr. Day","countryCode":"US","fixed":false,
             "global":false,"counties":["US-CA","US-AL"],"types":["Public","Bank"]}
        ]"#;
        let parsed: Vec<HolidayRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].launch_year, Some(1949));
        assert_eq!(parsed[0].counties, None);
        assert_eq!(
            parsed[1].counties.as_deref(),
            Some(&["US-CA".to_string(), "US-AL".to_string()][..])
        );
        assert_eq!(parsed[1].launch_year, None);
    }

    #[test]
    fn decodes_country_list() {
        let raw = r#"[{"countryCode":"AD","name":"Andorra"},{"countryCode":"KR","name":"South Korea"}]"#;
        let parsed: Vec<CountryRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed[1].country_code, "KR");
    }
}
