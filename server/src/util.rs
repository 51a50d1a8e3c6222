use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::server_config::cfg;

/// UTC day boundaries for a digest date: `[00:00:00.000, 23:59:59.999]`.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

/// Today's calendar date in the configured timezone. Used by the scheduler
/// and the run endpoint to pick the default target date.
pub fn local_today() -> NaiveDate {
    Utc::now().with_timezone(&cfg.settings.timezone).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 7).unwrap();
        let (start, end) = day_bounds(date);

        assert_eq!(start.to_rfc3339(), "2024-10-07T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-10-07T23:59:59.999+00:00");
        assert!(start < end);
    }
}
