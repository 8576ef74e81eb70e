//! Calendar-day buckets for the uptime/latency trend chart

use crate::analytics::{mean_latency, percent};
use crate::models::StatusRecord;
use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of most recent days kept in a trend
pub const TREND_DAYS: usize = 7;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub uptime: u32,
    pub avg_latency_ms: u64,
}

impl TrendPoint {
    /// Short `M/D` axis label
    pub fn label(&self) -> String {
        self.date.format("%-m/%-d").to_string()
    }
}

/// Trend over the local calendar days of the history.
pub fn bucketize(history: &[StatusRecord]) -> Vec<TrendPoint> {
    bucketize_in(history, &Local)
}

/// Trend with days taken in the given timezone.
///
/// At most [`TREND_DAYS`] points, strictly ascending by date. Days without
/// records are not filled in.
pub fn bucketize_in<Tz: TimeZone>(history: &[StatusRecord], tz: &Tz) -> Vec<TrendPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<&StatusRecord>> = BTreeMap::new();
    for record in history {
        let date = record.timestamp.with_timezone(tz).date_naive();
        days.entry(date).or_default().push(record);
    }

    let skip = days.len().saturating_sub(TREND_DAYS);
    days.into_iter()
        .skip(skip)
        .map(|(date, records)| TrendPoint {
            date,
            uptime: percent(records.iter().filter(|r| r.up).count(), records.len()),
            avg_latency_ms: mean_latency(records.iter().copied()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Datelike, FixedOffset, Utc};

    fn check(id: u64, up: bool, latency: Option<u64>, timestamp: DateTime<Utc>) -> StatusRecord {
        StatusRecord {
            id,
            up,
            latency_ms: latency,
            status_code: 200,
            timestamp,
        }
    }

    fn day(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, d, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_history() {
        assert!(bucketize(&[]).is_empty());
        assert!(bucketize_in(&[], &Utc).is_empty());
    }

    #[test]
    fn test_single_day_bucket() {
        let history = vec![
            check(1, true, Some(100), day(3, 9)),
            check(2, false, None, day(3, 10)),
            check(3, true, Some(200), day(3, 11)),
            check(4, true, Some(300), day(3, 12)),
        ];

        let trend = bucketize_in(&history, &Utc);

        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2025, 8, 3).unwrap());
        assert_eq!(trend[0].uptime, 75);
        assert_eq!(trend[0].avg_latency_ms, 150);
        assert_eq!(trend[0].label(), "8/3");
    }

    #[test]
    fn test_keeps_last_seven_days_ascending() {
        // Ten days, inserted newest first
        let history: Vec<StatusRecord> = (1..=10)
            .rev()
            .map(|d| check(d as u64, d % 2 == 0, Some(10 * d as u64), day(d, 6)))
            .collect();

        let trend = bucketize_in(&history, &Utc);

        assert_eq!(trend.len(), TREND_DAYS);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2025, 8, 4).unwrap());
        assert_eq!(trend[6].date, NaiveDate::from_ymd_opt(2025, 8, 10).unwrap());
        assert!(trend.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(trend[0].uptime, 100);
        assert_eq!(trend[1].uptime, 0);
        assert_eq!(trend[6].avg_latency_ms, 100);
    }

    #[test]
    fn test_sparse_days_are_not_padded() {
        let history = vec![
            check(1, true, Some(10), day(1, 1)),
            check(2, true, Some(10), day(20, 1)),
            check(3, false, None, day(5, 1)),
        ];

        let trend = bucketize_in(&history, &Utc);

        let dates: Vec<u32> = trend.iter().map(|p| p.date.day()).collect();
        assert_eq!(dates, vec![1, 5, 20]);
    }

    #[test]
    fn test_days_follow_the_timezone() {
        // 23:30 UTC on the 3rd is already the 4th at UTC+2
        let history = vec![
            check(1, true, Some(10), Utc.with_ymd_and_hms(2025, 8, 3, 23, 30, 0).unwrap()),
            check(2, false, None, day(3, 12)),
        ];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        assert_eq!(bucketize_in(&history, &Utc).len(), 1);

        let trend = bucketize_in(&history, &plus_two);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].uptime, 0);
        assert_eq!(trend[1].uptime, 100);
        assert_eq!(trend[1].date, NaiveDate::from_ymd_opt(2025, 8, 4).unwrap());
    }
}
