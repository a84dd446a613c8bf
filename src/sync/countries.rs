use std::collections::HashSet;
use tracing::{info, warn};

use crate::database_ops::provider::HolidayProvider;
use crate::database_ops::store::HolidayStore;
use crate::error::{SyncError, SyncResult};
use crate::model::NewCountry;

/// Replace the stored country set with the provider's list.
///
/// Codes are trimmed and upper-cased; entries that are not two ASCII letters
/// are skipped and the first occurrence of a code wins.
pub async fn sync_countries(
    store: &dyn HolidayStore,
    provider: &dyn HolidayProvider,
) -> SyncResult<usize> {
    let fetched = provider.fetch_countries().await?;
    let mut seen = HashSet::with_capacity(fetched.len());
    let countries: Vec<NewCountry> = fetched
        .into_iter()
        .filter_map(|c| {
            let code = c.country_code.trim().to_ascii_uppercase();
            if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_uppercase()) {
                warn!(code = %c.country_code, "ignoring malformed country code");
                return None;
            }
            seen.insert(code.clone()).then(|| NewCountry {
                code,
                name: c.name.trim().to_string(),
            })
        })
        .collect();
    if countries.is_empty() {
        return Err(SyncError::empty("AvailableCountries", None));
    }
    let stored = store.replace_countries(&countries).await?;
    info!(countries = stored, "country list replaced");
    Ok(stored)
}
