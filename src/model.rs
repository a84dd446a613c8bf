//! Domain records shared by the store, the reconciliation engine and the API.
//!
//! Multi-valued holiday fields (`counties`, `types`) are kept in their
//! serialized form: a comma-joined, sorted, de-duplicated list. Canonicalizing
//! on the way in means two provider payloads that only differ by tag order
//! compare equal and are stored byte-identically.
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Country as delivered by the provider, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCountry {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HolidayType {
    Public,
    Bank,
    School,
    Authorities,
    Optional,
    Observance,
}

impl HolidayType {
    pub const ALL: [HolidayType; 6] = [
        HolidayType::Public,
        HolidayType::Bank,
        HolidayType::School,
        HolidayType::Authorities,
        HolidayType::Optional,
        HolidayType::Observance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayType::Public => "Public",
            HolidayType::Bank => "Bank",
            HolidayType::School => "School",
            HolidayType::Authorities => "Authorities",
            HolidayType::Optional => "Optional",
            HolidayType::Observance => "Observance",
        }
    }
}

impl fmt::Display for HolidayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolidayType {
    type Err = String;

    /// Accepts both the provider spelling (`Public`) and the upper-case enum
    /// spelling used by API callers (`PUBLIC`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        HolidayType::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| format!("unknown holiday type '{t}'"))
    }
}

/// Join a list of tags into the canonical stored form. Blank entries are
/// dropped; an empty result maps to `None`.
pub fn canonical_list<I, S>(items: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .sorted()
        .dedup()
        .join(",");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Split a stored list back into its items.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) if !s.is_empty() => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// Surrogate id; `None` until the store has inserted the row.
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub local_name: String,
    pub name: String,
    pub country: Country,
    pub fixed: bool,
    pub global: bool,
    /// Canonical comma-joined subdivision codes; `None` = not applicable.
    pub counties: Option<String>,
    pub launch_year: Option<i32>,
    /// Canonical comma-joined `HolidayType` values, never empty.
    pub types: String,
}

/// Identity of a holiday across syncs: `(country.code, date, name, counties)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolidayKey {
    pub country_code: String,
    pub date: NaiveDate,
    pub name: String,
    pub counties: Option<String>,
}

impl Holiday {
    pub fn key(&self) -> HolidayKey {
        HolidayKey {
            country_code: self.country.code.clone(),
            date: self.date,
            name: self.name.clone(),
            counties: self.counties.clone(),
        }
    }

    /// True when every descriptive field that a sync may change is equal.
    /// `global` is deliberately outside the comparison set.
    pub fn same_content(&self, other: &Holiday) -> bool {
        self.local_name == other.local_name
            && self.name == other.name
            && self.fixed == other.fixed
            && self.counties == other.counties
            && self.launch_year == other.launch_year
            && self.types == other.types
    }

    /// Overwrite the mutable fields with `fresh`, keeping id and country.
    pub fn update_from(&mut self, fresh: &Holiday) {
        self.date = fresh.date;
        self.local_name = fresh.local_name.clone();
        self.name = fresh.name.clone();
        self.fixed = fresh.fixed;
        self.global = fresh.global;
        self.counties = fresh.counties.clone();
        self.launch_year = fresh.launch_year;
        self.types = fresh.types.clone();
    }

    pub fn counties_list(&self) -> Vec<String> {
        split_list(self.counties.as_deref())
    }

    pub fn types_list(&self) -> Vec<String> {
        split_list(Some(self.types.as_str()))
    }

    pub fn has_any_type(&self, wanted: &[HolidayType]) -> bool {
        wanted.is_empty()
            || self
                .types_list()
                .iter()
                .any(|t| wanted.iter().any(|w| w.as_str().eq_ignore_ascii_case(t)))
    }
}

/// Result of reconciling one (country, year) scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub old_count: usize,
    pub new_count: usize,
    pub actual_added_count: usize,
    pub actual_deleted_count: usize,
}

/// Aggregate of one `sync_range` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub total_count: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub country_count: usize,
    pub year_range: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// First and last calendar day of `year`.
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kr() -> Country {
        Country {
            id: 1,
            code: "KR".into(),
            name: "South Korea".into(),
        }
    }

    fn holiday(name: &str, types: &str) -> Holiday {
        Holiday {
            id: None,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            local_name: "새해".into(),
            name: name.into(),
            country: kr(),
            fixed: true,
            global: true,
            counties: None,
            launch_year: None,
            types: types.into(),
        }
    }

    #[test]
    fn canonical_list_sorts_dedups_and_drops_blanks() {
        assert_eq!(
            canonical_list(["US-NY", "US-CA", " ", "US-CA"]),
            Some("US-CA,US-NY".to_string())
        );
        assert_eq!(canonical_list(Vec::<String>::new()), None);
        assert_eq!(canonical_list(["", "  "]), None);
    }

    #[test]
    fn split_list_round_trips_canonical_form() {
        assert_eq!(split_list(Some("Bank,Public")), vec!["Bank", "Public"]);
        assert!(split_list(None).is_empty());
        assert!(split_list(Some("")).is_empty());
    }

    #[test]
    fn holiday_type_parses_both_spellings() {
        assert_eq!("Public".parse::<HolidayType>(), Ok(HolidayType::Public));
        assert_eq!("OBSERVANCE".parse::<HolidayType>(), Ok(HolidayType::Observance));
        assert!("Festival".parse::<HolidayType>().is_err());
    }

    #[test]
    fn global_flag_is_not_part_of_content() {
        let a = holiday("New Year's Day", "Public");
        let mut b = a.clone();
        b.global = false;
        b.id = Some(99);
        assert!(a.same_content(&b));
        b.types = "Bank,Public".into();
        assert!(!a.same_content(&b));
    }

    #[test]
    fn key_includes_counties() {
        let a = holiday("Labour Day", "Public");
        let mut b = a.clone();
        b.counties = Some("KR-11".into());
        assert_ne!(a.key(), b.key());
        b.counties = None;
        b.local_name = "다른".into();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn update_from_keeps_identity() {
        let mut stored = holiday("New Year's Day", "Public");
        stored.id = Some(7);
        let mut fresh = holiday("New Year's Day", "Bank,Public");
        fresh.launch_year = Some(1949);
        stored.update_from(&fresh);
        assert_eq!(stored.id, Some(7));
        assert_eq!(stored.types, "Bank,Public");
        assert_eq!(stored.launch_year, Some(1949));
    }

    #[test]
    fn type_filter_matches_any() {
        let h = holiday("New Year's Day", "Bank,Public");
        assert!(h.has_any_type(&[]));
        assert!(h.has_any_type(&[HolidayType::School, HolidayType::Bank]));
        assert!(!h.has_any_type(&[HolidayType::Observance]));
    }

    #[test]
    fn year_bounds_cover_whole_year() {
        let (s, e) = year_bounds(2024).unwrap();
        assert_eq!(s.to_string(), "2024-01-01");
        assert_eq!(e.to_string(), "2024-12-31");
    }
}
