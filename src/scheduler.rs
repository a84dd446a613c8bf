//! Yearly refresh job: every 2 January at 01:00 KST the previous and the
//! current year are re-synchronised for all countries.
use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::sync::HolidayService;

/// Years re-synchronised by each scheduled run.
pub const SCHEDULED_YEARS: u32 = 2;

const KST_OFFSET_SECS: i32 = 9 * 3600;

fn kst() -> Option<FixedOffset> {
    FixedOffset::east_opt(KST_OFFSET_SECS)
}

fn run_in_year(year: i32) -> Option<DateTime<Utc>> {
    kst()?
        .with_ymd_and_hms(year, 1, 2, 1, 0, 0)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// First scheduled run strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let year = now.with_timezone(&kst()?).year();
    match run_in_year(year) {
        Some(t) if t > now => Some(t),
        _ => run_in_year(year + 1),
    }
}

/// Spawn the scheduler loop on the current tokio runtime.
pub fn spawn(service: HolidayService) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_run_after(now) else {
                warn!("could not compute next scheduled run; scheduler stopped");
                return;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, wait_secs = wait.as_secs(), "yearly sync scheduled");
            tokio::time::sleep(wait).await;

            info!("scheduled sync started");
            let report = service.sync_recent_years(SCHEDULED_YEARS).await;
            info!(
                range = %report.year_range,
                total = report.total_count,
                success = report.success_count,
                fail = report.fail_count,
                secs = report.duration_seconds,
                "scheduled sync finished"
            );
        }
    })
}
