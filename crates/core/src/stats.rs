//! Per-habit metrics computed over a set of done-mark dates.

use chrono::{Datelike, Days, NaiveDate};

use crate::state::DateSet;

pub fn total_all(logs: &DateSet) -> usize {
    logs.len()
}

pub fn month_total(logs: &DateSet, year: i32, month: u32) -> usize {
    logs.iter()
        .filter(|d| d.year() == year && d.month() == month)
        .count()
}

pub fn year_total(logs: &DateSet, year: i32) -> usize {
    logs.iter().filter(|d| d.year() == year).count()
}

pub fn count_in_range(logs: &DateSet, start: NaiveDate, end: NaiveDate) -> usize {
    logs.range(start..=end).count()
}

pub fn last_check_date(logs: &DateSet) -> Option<NaiveDate> {
    logs.iter().next_back().copied()
}

/// Longest run of consecutive marked days.
pub fn max_consecutive(logs: &DateSet) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &date in logs {
        run = match prev.and_then(|p| p.succ_opt()) {
            Some(next) if next == date => run + 1,
            _ => 1,
        };
        prev = Some(date);
        best = best.max(run);
    }
    best
}

/// Days since the habit was created, inclusive of both endpoints.
pub fn days_elapsed(created: NaiveDate, today: NaiveDate) -> i64 {
    (today - created).num_days() + 1
}

/// Sunday-to-Saturday week containing `date`.
pub fn week_range_of(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let back = date.weekday().num_days_from_sunday() as u64;
    let start = date - Days::new(back);
    let end = start + Days::new(6);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn set(dates: &[NaiveDate]) -> DateSet {
        dates.iter().copied().collect()
    }

    #[test]
    fn max_consecutive_spans_month_boundary() {
        let logs = set(&[
            d(2026, 1, 30),
            d(2026, 1, 31),
            d(2026, 2, 1),
            d(2026, 2, 5),
        ]);
        assert_eq!(max_consecutive(&logs), 3);
    }

    #[test]
    fn max_consecutive_empty_is_zero() {
        assert_eq!(max_consecutive(&DateSet::new()), 0);
    }

    #[test]
    fn month_and_year_totals() {
        let logs = set(&[d(2025, 12, 31), d(2026, 1, 1), d(2026, 1, 15), d(2026, 2, 1)]);
        assert_eq!(month_total(&logs, 2026, 1), 2);
        assert_eq!(year_total(&logs, 2026), 3);
        assert_eq!(total_all(&logs), 4);
    }

    #[test]
    fn range_count_is_inclusive() {
        let logs = set(&[d(2026, 3, 1), d(2026, 3, 5), d(2026, 3, 10)]);
        assert_eq!(count_in_range(&logs, d(2026, 3, 1), d(2026, 3, 5)), 2);
    }

    #[test]
    fn last_check_is_max_date() {
        let logs = set(&[d(2026, 3, 1), d(2026, 3, 9)]);
        assert_eq!(last_check_date(&logs), Some(d(2026, 3, 9)));
        assert_eq!(last_check_date(&DateSet::new()), None);
    }

    #[test]
    fn week_range_starts_sunday() {
        // 2026-08-26 is a Wednesday.
        let (start, end) = week_range_of(d(2026, 8, 26));
        assert_eq!(start, d(2026, 8, 23));
        assert_eq!(end, d(2026, 8, 29));
        assert_eq!(start.weekday(), Weekday::Sun);
    }

    #[test]
    fn days_elapsed_counts_both_endpoints() {
        assert_eq!(days_elapsed(d(2026, 3, 1), d(2026, 3, 1)), 1);
        assert_eq!(days_elapsed(d(2026, 3, 1), d(2026, 3, 10)), 10);
    }
}
