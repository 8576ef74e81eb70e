//! Health analytics derived from a service's status history
//!
//! Everything here is pure and recomputed on every read. Records may arrive in
//! any order; only their timestamps are used for ordering.

use crate::models::StatusRecord;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Length of the trailing "recent" window
pub const RECENT_WINDOW_HOURS: i64 = 24;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DerivedAnalytics {
    pub total_checks: usize,
    /// Whole percent, 0..=100
    pub uptime: u32,
    pub avg_latency_ms: u64,
    pub downtime_count: usize,
    pub last_downtime: Option<DateTime<Utc>>,
    /// Uptime over the trailing window; 0 when the window holds no records
    pub recent_uptime: u32,
    pub recent_checks: usize,
}

/// Round `numerator / denominator` to the nearest integer, halves up.
pub(crate) fn round_half_up(numerator: u64, denominator: u64) -> u64 {
    debug_assert!(denominator > 0);
    (2 * numerator + denominator) / (2 * denominator)
}

/// Whole-percent share of `part` in `total`.
///
/// Rounds half up, except that anything short of every check being up stays
/// below 100.
pub(crate) fn percent(part: usize, total: usize) -> u32 {
    let rounded = round_half_up(100 * part as u64, total as u64) as u32;
    if part < total { rounded.min(99) } else { rounded }
}

pub(crate) fn mean_latency<'a>(records: impl IntoIterator<Item = &'a StatusRecord>) -> u64 {
    let (sum, count) = records
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), r| (sum + r.latency_or_zero(), count + 1));
    if count == 0 { 0 } else { round_half_up(sum, count) }
}

/// Summary analytics, or `None` when there is no history yet.
pub fn aggregate(history: &[StatusRecord], now: DateTime<Utc>) -> Option<DerivedAnalytics> {
    if history.is_empty() {
        return None;
    }

    let total_checks = history.len();
    let up_count = history.iter().filter(|r| r.up).count();

    let downtimes = history.iter().filter(|r| !r.up);
    let downtime_count = downtimes.clone().count();
    let last_downtime = downtimes.map(|r| r.timestamp).max();

    let window_start = now - Duration::hours(RECENT_WINDOW_HOURS);
    let recent: Vec<&StatusRecord> = history.iter().filter(|r| r.timestamp >= window_start).collect();
    let recent_uptime = if recent.is_empty() {
        0
    } else {
        percent(recent.iter().filter(|r| r.up).count(), recent.len())
    };

    Some(DerivedAnalytics {
        total_checks,
        uptime: percent(up_count, total_checks),
        avg_latency_ms: mean_latency(history),
        downtime_count,
        last_downtime,
        recent_uptime,
        recent_checks: recent.len(),
    })
}

/// The most recent check, used for "online/offline now".
pub fn current_status(history: &[StatusRecord]) -> Option<&StatusRecord> {
    history.iter().max_by_key(|r| r.timestamp)
}

/// Up to `limit` checks, newest first.
pub fn recent_activity(history: &[StatusRecord], limit: usize) -> Vec<&StatusRecord> {
    let mut records: Vec<&StatusRecord> = history.iter().collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.truncate(limit);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 10, hour, 0, 0).unwrap()
    }

    fn check(id: u64, up: bool, latency: Option<u64>, timestamp: DateTime<Utc>) -> StatusRecord {
        StatusRecord {
            id,
            up,
            latency_ms: latency,
            status_code: if up { 200 } else { 503 },
            timestamp,
        }
    }

    #[test]
    fn test_empty_history_has_no_analytics() {
        assert_eq!(aggregate(&[], at(12)), None);
        assert!(current_status(&[]).is_none());
        assert!(recent_activity(&[], 20).is_empty());
    }

    #[test]
    fn test_three_up_one_down() {
        let history = vec![
            check(1, true, Some(100), at(8)),
            check(2, true, Some(200), at(9)),
            check(3, false, None, at(10)),
            check(4, true, Some(300), at(11)),
        ];

        let analytics = aggregate(&history, at(12)).unwrap();

        assert_eq!(analytics.total_checks, 4);
        assert_eq!(analytics.uptime, 75);
        assert_eq!(analytics.downtime_count, 1);
        assert_eq!(analytics.last_downtime, Some(at(10)));
        // (100 + 200 + 0 + 300) / 4
        assert_eq!(analytics.avg_latency_ms, 150);
        assert_eq!(analytics.recent_checks, 4);
        assert_eq!(analytics.recent_uptime, 75);
    }

    #[test]
    fn test_uptime_is_100_only_when_all_up() {
        let all_up: Vec<StatusRecord> = (0..5).map(|i| check(i, true, Some(50), at(i as u32))).collect();
        assert_eq!(aggregate(&all_up, at(12)).unwrap().uptime, 100);

        // 199 of 200 up is 99.5%, which must not round to 100
        let mut nearly: Vec<StatusRecord> =
            (0..199).map(|i| check(i, true, Some(50), at(1))).collect();
        nearly.push(check(199, false, None, at(2)));
        assert_eq!(aggregate(&nearly, at(12)).unwrap().uptime, 99);
    }

    #[test]
    fn test_uptime_bounds() {
        for up in 0..=7u64 {
            let history: Vec<StatusRecord> = (0..7)
                .map(|i| check(i, i < up, Some(10), at(i as u32)))
                .collect();
            let uptime = aggregate(&history, at(12)).unwrap().uptime;
            assert!(uptime <= 100);
            assert_eq!(uptime == 100, up == 7);
        }
    }

    #[test]
    fn test_rounding_is_half_up() {
        assert_eq!(round_half_up(1, 2), 1);
        assert_eq!(round_half_up(5, 2), 3);
        assert_eq!(round_half_up(4, 3), 1);
        assert_eq!(round_half_up(5, 3), 2);
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(2, 3), 67);
    }

    #[test]
    fn test_stale_history_has_zero_recent_uptime() {
        let now = at(12);
        let history = vec![
            check(1, true, Some(100), now - Duration::hours(30)),
            check(2, true, Some(100), now - Duration::hours(48)),
        ];

        let analytics = aggregate(&history, now).unwrap();

        assert_eq!(analytics.uptime, 100);
        assert_eq!(analytics.recent_checks, 0);
        assert_eq!(analytics.recent_uptime, 0);
    }

    #[test]
    fn test_recent_window_boundary_is_inclusive() {
        let now = at(12);
        let history = vec![
            check(1, false, None, now - Duration::hours(24)),
            check(2, true, Some(10), now - Duration::hours(24) - Duration::seconds(1)),
        ];

        let analytics = aggregate(&history, now).unwrap();
        assert_eq!(analytics.recent_checks, 1);
        assert_eq!(analytics.recent_uptime, 0);
        assert_eq!(analytics.uptime, 50);
    }

    #[test]
    fn test_last_downtime_ignores_arrival_order() {
        let history = vec![
            check(1, false, None, at(9)),
            check(2, false, None, at(11)),
            check(3, true, Some(10), at(12)),
            check(4, false, None, at(7)),
        ];

        let analytics = aggregate(&history, at(13)).unwrap();
        assert_eq!(analytics.last_downtime, Some(at(11)));
        assert_eq!(analytics.downtime_count, 3);
    }

    #[test]
    fn test_no_downtime() {
        let history = vec![check(1, true, Some(10), at(1))];
        let analytics = aggregate(&history, at(2)).unwrap();
        assert_eq!(analytics.downtime_count, 0);
        assert_eq!(analytics.last_downtime, None);
    }

    #[test]
    fn test_current_status_is_latest_regardless_of_order() {
        let t1 = check(1, true, Some(10), at(1));
        let t2 = check(2, false, None, at(2));
        let t3 = check(3, true, Some(30), at(3));

        for history in [
            vec![t1.clone(), t2.clone(), t3.clone()],
            vec![t3.clone(), t1.clone(), t2.clone()],
            vec![t2.clone(), t3.clone(), t1.clone()],
        ] {
            assert_eq!(current_status(&history).unwrap().id, 3);
        }
    }

    #[test]
    fn test_recent_activity_is_newest_first_and_bounded() {
        let history: Vec<StatusRecord> = [5, 1, 9, 3, 7]
            .iter()
            .map(|&h| check(h as u64, true, Some(10), at(h)))
            .collect();

        let recent = recent_activity(&history, 3);
        let ids: Vec<u64> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![9, 7, 5]);

        assert_eq!(recent_activity(&history, 20).len(), 5);
    }
}
