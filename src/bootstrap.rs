//! First-start seeding of an empty database.
use tracing::{info, warn};

use crate::database_ops::store::HolidayStore;
use crate::sync::HolidayService;

/// Years loaded when the holiday table is empty.
pub const SEED_YEARS: u32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub countries_synced: Option<usize>,
    pub holidays_seeded: bool,
}

/// Load countries when none are stored, then the last `SEED_YEARS` years of
/// holidays when none are stored. Failures are logged and never fatal.
pub async fn seed_if_empty(service: &HolidayService) -> SeedSummary {
    let mut summary = SeedSummary::default();
    let store = service.store();

    match store.count_countries().await {
        Ok(0) => match service.sync_countries().await {
            Ok(n) => {
                info!(countries = n, "seeded country list");
                summary.countries_synced = Some(n);
            }
            Err(e) => warn!(error = %e, code = e.code(), "country seeding failed"),
        },
        Ok(n) => info!(countries = n, "countries present; skipping country seed"),
        Err(e) => warn!(error = %e, "could not count countries"),
    }

    match store.count_all().await {
        Ok(0) => {
            let report = service.sync_recent_years(SEED_YEARS).await;
            info!(
                range = %report.year_range,
                success = report.success_count,
                fail = report.fail_count,
                "seeded holidays"
            );
            summary.holidays_seeded = true;
        }
        Ok(n) => info!(holidays = n, "holidays present; skipping holiday seed"),
        Err(e) => warn!(error = %e, "could not count holidays"),
    }
    summary
}
