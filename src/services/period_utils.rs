use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::models::kpi::UpdateFrequency;

/// Reporting-period key of `date` for a KPI's update frequency.
///
/// Weekly keys use the ISO week-numbering year, so 2024-12-30 is `2025-W01`.
pub fn period_key(frequency: UpdateFrequency, date: NaiveDate) -> String {
    match frequency {
        UpdateFrequency::Daily => date.format("%Y-%m-%d").to_string(),
        UpdateFrequency::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        UpdateFrequency::Monthly => format!("{}-{:02}", date.year(), date.month()),
        UpdateFrequency::Quarterly => {
            format!("{}-Q{}", date.year(), (date.month() - 1) / 3 + 1)
        }
        UpdateFrequency::Yearly => date.year().to_string(),
    }
}

/// Calendar date of `instant` as seen in the reporting timezone.
pub fn local_date(instant: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    instant.with_timezone(&timezone).date_naive()
}
